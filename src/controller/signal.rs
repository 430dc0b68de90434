//! Analog signal conditioning
//!
//! Every place that turns a raw stick value into something usable goes through
//! these functions, so the deadzone and scaling policy lives in exactly one
//! spot. Navigation uses the discretised form, mouse motion the normalised one.

/// Raw analog range of the reference pad, used to map stick values to roughly [-1, 1].
pub const RAW_AXIS_RANGE: f32 = 1800.0;

/// Returns 0 for values strictly inside the deadzone, the value unchanged otherwise.
pub fn apply_deadzone(value: i32, deadzone: i32) -> i32 {
    if value.saturating_abs() < deadzone {
        0
    } else {
        value
    }
}

/// Applies the deadzone, scales to the raw range and multiplies by `sensitivity`.
pub fn normalize(value: i32, deadzone: i32, sensitivity: f32) -> f32 {
    let value = apply_deadzone(value, deadzone);
    if value == 0 {
        return 0.0;
    }
    value as f32 / RAW_AXIS_RANGE * sensitivity
}

/// Maps a raw value to -1, 0 or +1 after the deadzone, following the raw sign.
pub fn discretize(value: i32, deadzone: i32) -> i8 {
    apply_deadzone(value, deadzone).signum() as i8
}
