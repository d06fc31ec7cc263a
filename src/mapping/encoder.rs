//! Sample → DATA payload encoding
//!
//! ```text
//! offset  0   1        2      3         4..5            6..11
//!        ┌───┬────────┬──────┬─────────┬───────────────┬─────────┐
//!        │ 0 │buttons │brake │throttle │ tilt (i16 BE) │ 0 ... 0 │
//!        └───┴────────┴──────┴─────────┴───────────────┴─────────┘
//! ```
//!
//! The encoder only clamps tilt. Brake and throttle are truncated to a byte and
//! must already be within 0..=255.

use super::buttons::ButtonMapping;
use crate::link::DATA_PAYLOAD_LEN;

/// Physical bound of the tilt axis (one g, in m/s²)
pub const TILT_LIMIT: f32 = 9.8;

/// One control input snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    pub shift_up: bool,
    pub shift_down: bool,
    pub handbrake: bool,
    /// 0.0..=255.0
    pub brake: f32,
    /// 0.0..=255.0
    pub throttle: f32,
    /// -9.8..=9.8, clamped by the encoder
    pub tilt: f32,
}

/// Scales tilt to the wire's signed 16-bit range
pub fn scale_tilt(tilt: f32) -> i16 {
    let clamped = tilt.clamp(-TILT_LIMIT, TILT_LIMIT);
    (clamped / TILT_LIMIT * i16::MAX as f32).round() as i16
}

pub fn encode_sample(sample: &Sample, mapping: &ButtonMapping) -> [u8; DATA_PAYLOAD_LEN] {
    let buttons = mapping.buttons_byte(sample.shift_up, sample.shift_down, sample.handbrake);
    let [tilt_high, tilt_low] = scale_tilt(sample.tilt).to_be_bytes();

    [
        0,
        buttons,
        sample.brake as u8,
        sample.throttle as u8,
        tilt_high,
        tilt_low,
        0,
        0,
        0,
        0,
        0,
        0,
    ]
}
