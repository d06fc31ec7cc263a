//! Turns the latest gamepad snapshot into shaped samples

use super::collector::PEDAL_MAX;
use crate::mapping::{AnalogEnvelope, AxisSettings, Sample};
use std::time::Instant;
use tokio::sync::watch;

/// Produces one [`Sample`] per transmission tick
///
/// Pedal values are clamped to 0..=255 here so the encoder can truncate safely,
/// then pass through their release envelopes.
#[derive(Debug)]
pub struct Sampler {
    input: watch::Receiver<Sample>,
    brake: AnalogEnvelope,
    throttle: AnalogEnvelope,
}

impl Sampler {
    pub fn new(input: watch::Receiver<Sample>, brake: AxisSettings, throttle: AxisSettings) -> Self {
        Self {
            input,
            brake: AnalogEnvelope::new(brake),
            throttle: AnalogEnvelope::new(throttle),
        }
    }

    pub fn sample(&mut self, now: Instant) -> Sample {
        let raw = *self.input.borrow_and_update();

        Sample {
            brake: self.brake.update(raw.brake.clamp(0.0, PEDAL_MAX), now),
            throttle: self.throttle.update(raw.throttle.clamp(0.0, PEDAL_MAX), now),
            ..raw
        }
    }
}
