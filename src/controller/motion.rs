//! Continuous pointer motion
//!
//! The reader writes the latest right-stick vector in [`SharedMotion`]; the
//! [`MotionEmitter`] samples it at a fixed frame rate and turns it into
//! relative pointer motion. Intermediate stick values between two frames are
//! dropped, only the latest one matters.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::device::SharedDevice;

/// 60 Hz
pub const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// Normalized magnitude below which an axis produces no motion
pub const ACTIVITY_THRESHOLD: f32 = 0.05;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionVector {
    pub x: f32,
    pub y: f32,
}

/// Latest desired pointer velocity. The lock is only held to copy two floats.
#[derive(Debug, Clone, Default)]
pub struct SharedMotion(Arc<Mutex<MotionVector>>);

impl SharedMotion {
    pub fn set_x(&self, x: f32) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).x = x;
    }

    pub fn set_y(&self, y: f32) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).y = y;
    }

    pub fn load(&self) -> MotionVector {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Device units for one frame, or `None` while the stick is at rest.
pub fn motion_frame(vector: MotionVector, speed: i32) -> Option<(i32, i32)> {
    if vector.x.abs() <= ACTIVITY_THRESHOLD && vector.y.abs() <= ACTIVITY_THRESHOLD {
        return None;
    }
    let speed = speed as f32;
    // truncation towards zero
    let dx = (vector.x * speed) as i32;
    let dy = (vector.y * speed) as i32;
    Some((dx, dy))
}

/// Handle of the fixed-rate motion thread
#[derive(Debug)]
pub struct MotionEmitter {
    token: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl MotionEmitter {
    /// Spawns the motion thread. `token` should be a child of the global
    /// shutdown token so either side can stop it.
    pub fn start(
        motion: SharedMotion,
        device: SharedDevice,
        speed: i32,
        token: CancellationToken,
    ) -> std::io::Result<Self> {
        let thread_token = token.clone();
        let thread = thread::Builder::new()
            .name("motion-emitter".into())
            .spawn(move || run_motion_loop(motion, device, speed, thread_token))?;

        info!("Motion emitter started ({:?} frames, speed {})", FRAME_INTERVAL, speed);
        Ok(Self {
            token,
            thread: Some(thread),
        })
    }

    /// Cancels the loop and waits for the thread. Safe to call twice.
    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Motion emitter thread panicked");
            } else {
                info!("Motion emitter stopped");
            }
        }
    }
}

impl Drop for MotionEmitter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_motion_loop(
    motion: SharedMotion,
    device: SharedDevice,
    speed: i32,
    token: CancellationToken,
) {
    let mut frames: u64 = 0;
    while !token.is_cancelled() {
        let started = Instant::now();

        // copy under the lock, emit without it
        let vector = motion.load();
        if let Some((dx, dy)) = motion_frame(vector, speed) {
            trace!("Motion frame ({}, {})", dx, dy);
            device.lock().emit_relative_motion(dx, dy);
            frames += 1;
        }

        if let Some(remaining) = FRAME_INTERVAL.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }
    debug!("Motion loop exiting after {} active frames", frames);
}
