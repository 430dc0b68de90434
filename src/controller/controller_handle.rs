//! Reader Handle - lifecycle of the controller pipeline
//!
//! Spawns the event reader on its own OS thread (real-time polling with
//! blocking sleeps does not belong on the async runtime) and lets `main`
//! wait for it during shutdown.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::event_collector::ReaderError;
use super::event_processor::{EventProcessor, ProcessorSettings};
use super::event_reader::{EventReader, ReaderSettings};
use super::motion::SharedMotion;
use crate::config::Config;
use crate::device::SharedDevice;
use crate::navigation::KeyboardLayout;
use crate::ui::PanelControl;

/// Handle of the running event reader thread
#[derive(Debug)]
pub struct ReaderHandle {
    thread: Option<JoinHandle<()>>,
}

impl ReaderHandle {
    /// Builds the event pipeline from `config` and starts reading.
    ///
    /// A controller that cannot be opened is logged and leaves the reader
    /// idle; the on-screen keyboard stays usable with the mouse.
    pub fn spawn(
        config: &Config,
        layout: Arc<KeyboardLayout>,
        device: SharedDevice,
        panel: Box<dyn PanelControl>,
        shutdown: CancellationToken,
    ) -> Result<Self, ReaderError> {
        let processor_settings = ProcessorSettings::new(&config.input, config.orientation);
        let reader_settings = ReaderSettings::from(&config.input);
        debug!(
            "Split settings: processor={:?}, reader={:?}",
            processor_settings, reader_settings
        );

        let motion = SharedMotion::default();
        let processor = EventProcessor::create(
            layout,
            processor_settings,
            motion.clone(),
            device.clone(),
            panel,
        );
        let reader = EventReader::create(reader_settings, processor, motion, device, shutdown);

        info!("Spawning Event Reader thread");
        let thread = thread::Builder::new()
            .name("event-reader".into())
            .spawn(move || {
                let path = reader.settings().controller_path.clone();
                match reader.open() {
                    Ok(mut reading) => {
                        if let Err(e) = reading.run_read_loop() {
                            warn!("Event Reader stopped: {}", e);
                        }
                        reading.finish();
                    }
                    Err(e) => {
                        error!("{}", e);
                        warn!(
                            "Controller {} unavailable, continuing without controller input",
                            path.display()
                        );
                    }
                }
            })
            .map_err(ReaderError::Spawn)?;

        Ok(Self {
            thread: Some(thread),
        })
    }

    /// Waits for the reader thread to exit.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Event Reader thread panicked");
            } else {
                debug!("Event Reader thread joined");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Orientation;
    use crate::device::VirtualInputDevice;
    use crate::ui::testing::RecordingPanel;
    use crate::ui::UiCommand;

    #[test]
    fn missing_controller_ends_the_thread_quietly() {
        let mut config = Config::default();
        config.input.controller_path = "/nonexistent/padboard-event".into();
        let panel = RecordingPanel::default();
        let device = SharedDevice::new(VirtualInputDevice::inert(Orientation::default()));

        let mut handle = ReaderHandle::spawn(
            &config,
            Arc::new(KeyboardLayout::standard()),
            device,
            Box::new(panel.clone()),
            CancellationToken::new(),
        )
        .unwrap();
        handle.join();
        handle.join();

        // initial focus is still announced for the on-screen keyboard
        assert_eq!(panel.commands(), vec![UiCommand::MoveFocus("ESC".into())]);
    }
}
