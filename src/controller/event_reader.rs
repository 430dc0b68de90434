use chrono::Local;
use statum::{machine, state};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::InputConfig;
use crate::controller::event_collector::{is_disconnect, ControllerSource, EvdevSource, ReaderError};
use crate::controller::event_processor::{Dispatch, EventProcessor};
use crate::controller::motion::{MotionEmitter, SharedMotion};
use crate::device::SharedDevice;

/// Wait before polling again when the controller had nothing to report
pub const POLL_RETRY: Duration = Duration::from_millis(5);

// Reader settings
#[derive(Clone, Debug, PartialEq)]
pub struct ReaderSettings {
    pub controller_path: PathBuf,
    pub mouse_speed: i32,
}

impl From<&InputConfig> for ReaderSettings {
    fn from(input: &InputConfig) -> Self {
        Self {
            controller_path: input.controller_path.clone(),
            mouse_speed: input.mouse_speed,
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum ReaderState {
    Opening,
    Reading,
}

#[machine]
#[derive(Debug)]
pub struct EventReader<S: ReaderState> {
    settings: ReaderSettings,

    // Routes every event; owns mode, cursor and stick caches
    processor: EventProcessor,

    // Hand-off to the motion thread
    motion: SharedMotion,
    device: SharedDevice,

    // Global shutdown flag
    shutdown: CancellationToken,

    source: Option<Box<dyn ControllerSource>>,
    emitter: Option<MotionEmitter>,
}

impl<S: ReaderState> EventReader<S> {
    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }
}

impl EventReader<Opening> {
    pub fn create(
        settings: ReaderSettings,
        processor: EventProcessor,
        motion: SharedMotion,
        device: SharedDevice,
        shutdown: CancellationToken,
    ) -> Self {
        debug!("Creating Event Reader with settings: {:?}", settings);
        Self::new(settings, processor, motion, device, shutdown, None, None)
    }

    /// Opens the configured evdev node and starts reading from it.
    pub fn open(self) -> Result<EventReader<Reading>, ReaderError> {
        let source = EvdevSource::open(&self.settings.controller_path)?;
        Ok(self.start(Box::new(source)))
    }

    /// Starts reading from `source`. The motion thread only runs when the
    /// virtual device is there to receive its output.
    pub fn start(mut self, source: Box<dyn ControllerSource>) -> EventReader<Reading> {
        self.source = Some(source);

        if self.device.is_ready() {
            match MotionEmitter::start(
                self.motion.clone(),
                self.device.clone(),
                self.settings.mouse_speed,
                self.shutdown.child_token(),
            ) {
                Ok(emitter) => self.emitter = Some(emitter),
                Err(e) => error!("Failed to spawn motion emitter thread: {}", e),
            }
        } else {
            warn!("Virtual input device unavailable, pointer motion disabled");
        }

        info!("Event Reader ready, transitioning to Reading state");
        self.transition()
    }
}

impl EventReader<Reading> {
    /// Polls the controller until shutdown is requested or the controller is lost.
    pub fn run_read_loop(&mut self) -> Result<(), ReaderError> {
        info!("Starting Event Reader loop");

        // For performance monitoring
        let mut event_count = 0u64;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(10);

        loop {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested, leaving Event Reader loop");
                return Ok(());
            }

            let Some(source) = self.source.as_mut() else {
                return Err(ReaderError::Disconnected);
            };

            match source.poll_event() {
                Ok(Some(event)) => {
                    event_count += 1;
                    if let Dispatch::Settle(delay) = self.processor.dispatch(&event) {
                        thread::sleep(delay);
                    }
                }
                Ok(None) => thread::sleep(POLL_RETRY),
                Err(e) if is_disconnect(&e) => {
                    error!("Controller lost: {}", e);
                    self.source = None;
                    return Err(ReaderError::Disconnected);
                }
                Err(e) => {
                    warn!("Failed to read controller event: {}", e);
                    thread::sleep(POLL_RETRY);
                }
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                info!(
                    "Event Reader stats: processed {} events in last {} seconds (avg {:.2}/sec)",
                    event_count,
                    log_interval.num_seconds(),
                    event_count as f64 / log_interval.num_seconds() as f64
                );
                event_count = 0;
                last_log_time = now;
            }
        }
    }

    /// Stops the motion thread. On shutdown the virtual device is released
    /// too; after a lost controller it stays up for the on-screen keyboard.
    pub fn finish(mut self) {
        if let Some(mut emitter) = self.emitter.take() {
            emitter.stop();
        }
        if self.shutdown.is_cancelled() {
            self.device.shutdown();
        }
        info!("Event Reader finished in {} mode", self.processor.mode());
    }
}
