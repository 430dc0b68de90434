use chrono::{DateTime, Local};
use evdev::{AbsoluteAxisType, Device, InputEvent, InputEventKind, Key};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

// Controller event with the kernel timestamp
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Axis {
        axis: PadAxis,
        value: i32,
        timestamp: DateTime<Local>,
    },
    Button {
        button: PadButton,
        state: ButtonState,
        timestamp: DateTime<Local>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadAxis {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadButton {
    LeftBumper,
    RightBumper,
    LeftTrigger,
    RightTrigger,
    Guide,
    RightThumb,
}

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("Failed to open controller {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to switch controller to non-blocking mode: {0}")]
    NonBlocking(io::Error),

    #[error("Controller disconnected")]
    Disconnected,

    #[error("Failed to spawn reader thread: {0}")]
    Spawn(io::Error),
}

/// Polled stream of controller events.
///
/// `Ok(None)` means nothing is ready right now; the caller decides how long
/// to wait before asking again.
pub trait ControllerSource: Send + fmt::Debug {
    fn poll_event(&mut self) -> io::Result<Option<ControllerEvent>>;
}

/// Controller read from an evdev node
pub struct EvdevSource {
    device: Device,
    pending: VecDeque<ControllerEvent>,
}

impl fmt::Debug for EvdevSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvdevSource")
            .field("name", &self.device.name())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl EvdevSource {
    pub fn open(path: &Path) -> Result<Self, ReaderError> {
        info!("Opening controller at {}", path.display());
        let device = Device::open(path).map_err(|source| ReaderError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        set_nonblocking(&device).map_err(ReaderError::NonBlocking)?;

        info!(
            "Controller opened: {} (vendor {:04x}, product {:04x})",
            device.name().unwrap_or("unknown"),
            device.input_id().vendor(),
            device.input_id().product()
        );
        Ok(Self {
            device,
            pending: VecDeque::new(),
        })
    }
}

impl ControllerSource for EvdevSource {
    fn poll_event(&mut self) -> io::Result<Option<ControllerEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        match self.device.fetch_events() {
            Ok(events) => {
                self.pending.extend(events.filter_map(|e| convert_event(&e)));
                Ok(self.pending.pop_front())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn set_nonblocking(device: &Device) -> io::Result<()> {
    let fd = device.as_raw_fd();
    // SAFETY: fd belongs to the open device for the duration of both calls
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: see above
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Whether a read error means the controller is gone for good
pub fn is_disconnect(error: &io::Error) -> bool {
    error.raw_os_error() == Some(libc::ENODEV)
}

/// Converts a raw evdev event, dropping everything the router has no use for.
pub fn convert_event(event: &InputEvent) -> Option<ControllerEvent> {
    let timestamp = DateTime::<Local>::from(event.timestamp());
    match event.kind() {
        InputEventKind::AbsAxis(axis) => {
            let axis = map_axis(axis)?;
            trace!("Axis {:?} = {}", axis, event.value());
            Some(ControllerEvent::Axis {
                axis,
                value: event.value(),
                timestamp,
            })
        }
        InputEventKind::Key(key) => {
            let button = map_button(key)?;
            let state = match event.value() {
                0 => ButtonState::Released,
                1 => ButtonState::Pressed,
                _ => {
                    trace!("Autorepeat ignored: {:?}", button);
                    return None;
                }
            };
            debug!(
                "Button {:?} {:?} at {}",
                button,
                state,
                timestamp.format("%H:%M:%S.%3f")
            );
            Some(ControllerEvent::Button {
                button,
                state,
                timestamp,
            })
        }
        _ => None,
    }
}

fn map_axis(axis: AbsoluteAxisType) -> Option<PadAxis> {
    match axis {
        AbsoluteAxisType::ABS_X => Some(PadAxis::LeftX),
        AbsoluteAxisType::ABS_Y => Some(PadAxis::LeftY),
        AbsoluteAxisType::ABS_RX => Some(PadAxis::RightX),
        AbsoluteAxisType::ABS_RY => Some(PadAxis::RightY),
        _ => None,
    }
}

fn map_button(key: Key) -> Option<PadButton> {
    match key {
        Key::BTN_TL => Some(PadButton::LeftBumper),
        Key::BTN_TR => Some(PadButton::RightBumper),
        Key::BTN_TL2 => Some(PadButton::LeftTrigger),
        Key::BTN_TR2 => Some(PadButton::RightTrigger),
        Key::BTN_MODE => Some(PadButton::Guide),
        Key::BTN_THUMBR => Some(PadButton::RightThumb),
        _ => None,
    }
}
