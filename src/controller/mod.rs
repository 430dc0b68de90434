//! Controller subsystem for gamepad input handling
//!
//! Implements the reading side of the pipeline:
//!
//! 1. [`event_collector`] - Raw evdev events to [`ControllerEvent`](event_collector::ControllerEvent)s
//! 2. [`event_processor`] - Mode-dependent routing to focus, UI and virtual device
//! 3. [`event_reader`] - Polling loop and lifecycle of the motion thread
//! 4. [`controller_handle`] - Thread spawning and shutdown
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► EvdevSource ──► EventProcessor ──┬──► FocusNavigator ──► UI
//!                                              ├──► VirtualInputDevice
//!                                              └──► SharedMotion ──► MotionEmitter (60 Hz)
//! ```
//!
//! The reader and the motion emitter run on their own threads; the only state
//! they share is [`SharedMotion`](motion::SharedMotion).

pub mod controller_handle;
pub mod event_collector;
pub mod event_processor;
pub mod event_reader;
pub mod motion;
pub mod signal;

pub use controller_handle::ReaderHandle;
