//! Virtual input device
//!
//! Wraps a uinput device that the rest of the desktop sees as a real
//! keyboard and mouse. The device is created once at startup; if any step of
//! the creation fails the wrapper stays inert and every emission becomes a
//! silent no-op, so navigation keeps working without injection rights.
//!
//! ```text
//! EventReader ─┐
//! MotionEmitter ├──► SharedDevice ──► EventSink ──► /dev/uinput
//! Dispatcher ──┘     (mutex, held only for one write)
//! ```
//!
//! Every emission is written as one batch terminated by exactly one
//! `SYN_REPORT`. The [`EventSink`] contract mirrors `VirtualDevice::emit`
//! from the evdev crate, which appends the report itself.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, BusType, EventType, InputEvent, InputId, Key, RelativeAxisType};
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, trace, warn};

use crate::config::Orientation;

const VENDOR_ID: u16 = 0x1234;
const PRODUCT_ID: u16 = 0x5678;
const DEVICE_VERSION: u16 = 1;

/// Keyboard key codes registered on the device (`KEY_ESC` up to the end of the standard block)
const KEYBOARD_KEY_CODES: std::ops::Range<u16> = 1..0x100;

/// Errors while creating the uinput device
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Cannot open uinput control device: {0}")]
    Open(#[source] io::Error),

    #[error("Failed to register {what} capabilities: {source}")]
    Capability {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create virtual device: {0}")]
    Create(#[source] io::Error),
}

/// Destination for batches of input events.
///
/// Implementations write all `events` and then exactly one `SYN_REPORT`.
pub trait EventSink: Send {
    fn emit(&mut self, events: &[InputEvent]) -> io::Result<()>;
}

struct UinputSink {
    device: VirtualDevice,
}

impl EventSink for UinputSink {
    fn emit(&mut self, events: &[InputEvent]) -> io::Result<()> {
        self.device.emit(events)
    }
}

/// Mouse buttons exposed by the virtual device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
}

impl MouseButton {
    pub fn key(self) -> Key {
        match self {
            MouseButton::Left => Key::BTN_LEFT,
            MouseButton::Right => Key::BTN_RIGHT,
        }
    }
}

pub struct VirtualInputDevice {
    sink: Option<Box<dyn EventSink>>,
    orientation: Orientation,
    // Keys and buttons currently reported as down, released on shutdown
    held: BTreeSet<u16>,
}

impl fmt::Debug for VirtualInputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualInputDevice")
            .field("ready", &self.is_ready())
            .field("orientation", &self.orientation)
            .field("held", &self.held)
            .finish()
    }
}

impl VirtualInputDevice {
    /// Creates the uinput device. Failures are logged and produce an inert device.
    pub fn initialize(name: &str, orientation: Orientation) -> Self {
        info!("Creating virtual input device '{}'", name);
        match create_uinput(name) {
            Ok(sink) => {
                info!("Virtual input device ready");
                Self::with_sink(Box::new(sink), orientation)
            }
            Err(e) => {
                error!("{}; keyboard and mouse injection disabled", e);
                Self::inert(orientation)
            }
        }
    }

    pub fn with_sink(sink: Box<dyn EventSink>, orientation: Orientation) -> Self {
        Self {
            sink: Some(sink),
            orientation,
            held: BTreeSet::new(),
        }
    }

    pub fn inert(orientation: Orientation) -> Self {
        Self {
            sink: None,
            orientation,
            held: BTreeSet::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.sink.is_some()
    }

    /// Writes a key or button state change.
    pub fn emit_key(&mut self, key: Key, pressed: bool) {
        let event = InputEvent::new(EventType::KEY, key.code(), i32::from(pressed));
        if self.write(&[event], "key event") && pressed {
            self.held.insert(key.code());
        }
        if !pressed {
            self.held.remove(&key.code());
        }
    }

    /// Presses and releases `key` as two separate batches.
    pub fn tap_key(&mut self, key: Key) {
        self.emit_key(key, true);
        self.emit_key(key, false);
    }

    pub fn emit_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        self.emit_key(button.key(), pressed);
    }

    /// Writes relative pointer motion after the configured orientation correction.
    pub fn emit_relative_motion(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }

        let (x, y) = orient_motion(self.orientation, dx, dy);
        let mut events = Vec::with_capacity(2);
        if x != 0 {
            events.push(InputEvent::new(
                EventType::RELATIVE,
                RelativeAxisType::REL_X.0,
                x,
            ));
        }
        if y != 0 {
            events.push(InputEvent::new(
                EventType::RELATIVE,
                RelativeAxisType::REL_Y.0,
                y,
            ));
        }
        self.write(&events, "relative motion");
    }

    /// Scrolls the wheel, positive is up.
    pub fn emit_wheel(&mut self, direction: i32) {
        if direction == 0 {
            return;
        }
        let event = InputEvent::new(
            EventType::RELATIVE,
            RelativeAxisType::REL_WHEEL.0,
            direction,
        );
        self.write(&[event], "wheel event");
    }

    /// Releases everything still held down.
    pub fn release_all(&mut self) {
        let held: Vec<u16> = self.held.iter().copied().collect();
        for code in held {
            debug!("Releasing held key {}", code);
            self.emit_key(Key::new(code), false);
        }
    }

    /// Destroys the virtual device. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.sink.is_none() {
            debug!("Virtual input device already shut down or never created");
            return;
        }
        self.release_all();
        // Dropping the uinput handle destroys the device and closes the fd
        self.sink = None;
        self.held.clear();
        info!("Virtual input device destroyed");
    }

    fn write(&mut self, events: &[InputEvent], what: &str) -> bool {
        let Some(sink) = self.sink.as_mut() else {
            trace!("Dropping {} while device is unavailable", what);
            return false;
        };
        match sink.emit(events) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write {}: {}", what, e);
                false
            }
        }
    }
}

/// Applies axis swap and inversion to a motion vector.
pub fn orient_motion(orientation: Orientation, dx: i32, dy: i32) -> (i32, i32) {
    let (x, y) = if orientation.swap_motion_axes {
        (dy, dx)
    } else {
        (dx, dy)
    };
    if orientation.invert_motion {
        (x.saturating_neg(), y.saturating_neg())
    } else {
        (x, y)
    }
}

fn create_uinput(name: &str) -> Result<UinputSink, DeviceError> {
    let mut keys = AttributeSet::<Key>::new();
    for code in KEYBOARD_KEY_CODES {
        keys.insert(Key::new(code));
    }
    keys.insert(Key::BTN_LEFT);
    keys.insert(Key::BTN_RIGHT);

    let mut axes = AttributeSet::<RelativeAxisType>::new();
    axes.insert(RelativeAxisType::REL_X);
    axes.insert(RelativeAxisType::REL_Y);
    axes.insert(RelativeAxisType::REL_WHEEL);

    let device = VirtualDeviceBuilder::new()
        .map_err(DeviceError::Open)?
        .name(name)
        .input_id(InputId::new(
            BusType::BUS_USB,
            VENDOR_ID,
            PRODUCT_ID,
            DEVICE_VERSION,
        ))
        .with_keys(&keys)
        .map_err(|source| DeviceError::Capability {
            what: "key",
            source,
        })?
        .with_relative_axes(&axes)
        .map_err(|source| DeviceError::Capability {
            what: "relative axis",
            source,
        })?
        .build()
        .map_err(DeviceError::Create)?;

    Ok(UinputSink { device })
}

/// Cloneable handle shared by the reader, the motion loop and the UI dispatcher
#[derive(Clone, Debug)]
pub struct SharedDevice(Arc<Mutex<VirtualInputDevice>>);

impl SharedDevice {
    pub fn new(device: VirtualInputDevice) -> Self {
        Self(Arc::new(Mutex::new(device)))
    }

    /// Locks the device. A poisoned lock is recovered, the device state stays usable.
    pub fn lock(&self) -> MutexGuard<'_, VirtualInputDevice> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ready(&self) -> bool {
        self.lock().is_ready()
    }

    pub fn shutdown(&self) {
        self.lock().shutdown();
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Records every batch together with its terminating report.
    #[derive(Clone, Debug, Default)]
    pub struct RecordingSink {
        events: Arc<Mutex<Vec<InputEvent>>>,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<InputEvent> {
            self.events.lock().unwrap().clone()
        }

        /// `(type, code, value)` triples, easier to compare in assertions
        pub fn triples(&self) -> Vec<(EventType, u16, i32)> {
            self.events()
                .iter()
                .map(|e| (e.event_type(), e.code(), e.value()))
                .collect()
        }

        pub fn clear(&self) {
            self.events.lock().unwrap().clear();
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&mut self, events: &[InputEvent]) -> io::Result<()> {
            let mut recorded = self.events.lock().unwrap();
            recorded.extend_from_slice(events);
            recorded.push(InputEvent::new(EventType::SYNCHRONIZATION, 0, 0));
            Ok(())
        }
    }

    /// Fails every write like a device whose reader went away.
    #[derive(Clone, Debug, Default)]
    pub struct BrokenSink {
        attempts: Arc<Mutex<usize>>,
    }

    impl BrokenSink {
        pub fn attempts(&self) -> usize {
            *self.attempts.lock().unwrap()
        }
    }

    impl EventSink for BrokenSink {
        fn emit(&mut self, _events: &[InputEvent]) -> io::Result<()> {
            *self.attempts.lock().unwrap() += 1;
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    pub fn recording_device(orientation: Orientation) -> (VirtualInputDevice, RecordingSink) {
        let sink = RecordingSink::default();
        let device = VirtualInputDevice::with_sink(Box::new(sink.clone()), orientation);
        (device, sink)
    }

    pub const SYN: (EventType, u16, i32) = (EventType::SYNCHRONIZATION, 0, 0);
}
