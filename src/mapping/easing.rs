//! Release shaping for the analog pedals
//!
//! A pedal follows its input directly while pressed. Once released it keeps its
//! last value for the sustain time, then falls back to zero over the release time
//! along an easing curve.
//!
//! ```text
//! value
//!   │████████████▌
//!   │            ▌███▖
//!   │            ▌    ▀▚▖
//!   │            ▌       ▀▚▄▖
//!   └────────────┴──────┴──────────► time
//!      pressed    sustain  release
//! ```

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Easing curve used for the release phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EasingType {
    #[default]
    FastOutSlowIn,
    LinearOutSlowIn,
    FastOutLinearIn,
    Linear,
}

impl EasingType {
    /// Maps animation progress 0..=1 to eased progress 0..=1
    pub fn transform(self, fraction: f32) -> f32 {
        let fraction = fraction.clamp(0.0, 1.0);
        match self {
            EasingType::FastOutSlowIn => CubicBezier::new(0.4, 0.0, 0.2, 1.0).transform(fraction),
            EasingType::LinearOutSlowIn => CubicBezier::new(0.0, 0.0, 0.2, 1.0).transform(fraction),
            EasingType::FastOutLinearIn => CubicBezier::new(0.4, 0.0, 1.0, 1.0).transform(fraction),
            EasingType::Linear => fraction,
        }
    }
}

/// Cubic bézier through (0,0) and (1,1) with two control points
#[derive(Debug, Clone, Copy)]
struct CubicBezier {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl CubicBezier {
    const EPSILON: f32 = 1e-5;

    fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    fn coordinate(t: f32, p1: f32, p2: f32) -> f32 {
        let inv = 1.0 - t;
        3.0 * inv * inv * t * p1 + 3.0 * inv * t * t * p2 + t * t * t
    }

    fn transform(&self, x: f32) -> f32 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }

        // x(t) is monotonic for control points inside 0..=1, so bisection converges
        let (mut low, mut high) = (0.0f32, 1.0f32);
        let mut t = x;
        for _ in 0..64 {
            let estimate = Self::coordinate(t, self.x1, self.x2);
            if (estimate - x).abs() < Self::EPSILON {
                break;
            }
            if estimate < x {
                low = t;
            } else {
                high = t;
            }
            t = (low + high) / 2.0;
        }

        Self::coordinate(t, self.y1, self.y2)
    }
}

/// Envelope parameters of one pedal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSettings {
    pub easing: EasingType,
    pub sustain_ms: u64,
    pub release_ms: u64,
}

impl AxisSettings {
    pub fn brake() -> Self {
        Self {
            easing: EasingType::FastOutSlowIn,
            sustain_ms: 100,
            release_ms: 400,
        }
    }

    pub fn throttle() -> Self {
        Self {
            easing: EasingType::Linear,
            sustain_ms: 50,
            release_ms: 200,
        }
    }

    pub fn sustain(&self) -> Duration {
        Duration::from_millis(self.sustain_ms)
    }

    pub fn release(&self) -> Duration {
        Duration::from_millis(self.release_ms)
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Following(f32),
    Sustaining { value: f32, since: Instant },
    Releasing { from: f32, since: Instant },
    Rest,
}

/// Stateful release shaping for one axis
#[derive(Debug, Clone)]
pub struct AnalogEnvelope {
    settings: AxisSettings,
    phase: Phase,
}

impl AnalogEnvelope {
    pub fn new(settings: AxisSettings) -> Self {
        Self {
            settings,
            phase: Phase::Rest,
        }
    }

    /// Feeds the current raw input and returns the shaped value at `now`
    pub fn update(&mut self, input: f32, now: Instant) -> f32 {
        if input > 0.0 {
            self.phase = Phase::Following(input);
            return input;
        }

        if let Phase::Following(value) = self.phase {
            self.phase = if value > 0.0 {
                Phase::Sustaining { value, since: now }
            } else {
                Phase::Rest
            };
        }

        if let Phase::Sustaining { value, since } = self.phase {
            let sustain = self.settings.sustain();
            if now.saturating_duration_since(since) < sustain {
                return value;
            }
            self.phase = Phase::Releasing {
                from: value,
                since: since + sustain,
            };
        }

        if let Phase::Releasing { from, since } = self.phase {
            let release = self.settings.release();
            let elapsed = now.saturating_duration_since(since);
            if elapsed < release {
                let fraction = elapsed.as_secs_f32() / release.as_secs_f32();
                return from * (1.0 - self.settings.easing.transform(fraction));
            }
            self.phase = Phase::Rest;
        }

        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn curves_hit_endpoints() {
        for easing in [
            EasingType::FastOutSlowIn,
            EasingType::LinearOutSlowIn,
            EasingType::FastOutLinearIn,
            EasingType::Linear,
        ] {
            assert_eq!(easing.transform(0.0), 0.0, "{easing:?}");
            assert_eq!(easing.transform(1.0), 1.0, "{easing:?}");
        }
    }

    #[test]
    fn curves_are_monotonic() {
        for easing in [
            EasingType::FastOutSlowIn,
            EasingType::LinearOutSlowIn,
            EasingType::FastOutLinearIn,
        ] {
            let mut previous = 0.0;
            for step in 1..=20 {
                let value = easing.transform(step as f32 / 20.0);
                assert!(value + 1e-4 >= previous, "{easing:?} at {step}");
                previous = value;
            }
        }
    }

    #[test]
    fn fast_out_slow_in_is_ahead_of_linear_at_midpoint() {
        let eased = EasingType::FastOutSlowIn.transform(0.5);
        assert!(eased > 0.5 && eased < 1.0, "{eased}");
        let eased = EasingType::FastOutLinearIn.transform(0.5);
        assert!(eased < 0.5, "{eased}");
    }

    #[test]
    fn envelope_follows_input_while_pressed() {
        let mut envelope = AnalogEnvelope::new(AxisSettings::brake());
        let start = Instant::now();
        assert_eq!(envelope.update(100.0, start), 100.0);
        assert_eq!(envelope.update(180.0, start + ms(20)), 180.0);
    }

    #[test]
    fn envelope_holds_then_releases_linearly() {
        let settings = AxisSettings {
            easing: EasingType::Linear,
            sustain_ms: 100,
            release_ms: 200,
        };
        let mut envelope = AnalogEnvelope::new(settings);
        let start = Instant::now();

        envelope.update(200.0, start);
        assert_eq!(envelope.update(0.0, start + ms(10)), 200.0);
        assert_eq!(envelope.update(0.0, start + ms(100)), 200.0);

        // sustain ends at 110 ms, halfway through release at 210 ms
        let halfway = envelope.update(0.0, start + ms(210));
        assert!((halfway - 100.0).abs() < 0.5, "{halfway}");

        assert_eq!(envelope.update(0.0, start + ms(310)), 0.0);
        assert_eq!(envelope.update(0.0, start + ms(400)), 0.0);
    }

    #[test]
    fn zero_durations_drop_immediately() {
        let settings = AxisSettings {
            easing: EasingType::Linear,
            sustain_ms: 0,
            release_ms: 0,
        };
        let mut envelope = AnalogEnvelope::new(settings);
        let start = Instant::now();
        envelope.update(90.0, start);
        assert_eq!(envelope.update(0.0, start + ms(1)), 0.0);
    }

    #[test]
    fn pressing_again_interrupts_release() {
        let mut envelope = AnalogEnvelope::new(AxisSettings::throttle());
        let start = Instant::now();
        envelope.update(255.0, start);
        envelope.update(0.0, start + ms(20));
        assert_eq!(envelope.update(40.0, start + ms(120)), 40.0);
        assert_eq!(envelope.update(0.0, start + ms(140)), 40.0);
    }
}
