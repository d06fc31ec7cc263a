//! Mapping of control input into DATA frames
//!
//! - [`buttons`] - key codes and the button byte layout
//! - [`encoder`] - pure `Sample` → 12-byte payload encoding
//! - [`easing`] - pedal release envelopes applied before encoding
//!
//! ```text
//! InputSnapshot ──► [AnalogEnvelope] ──► Sample ──► [encode_sample] ──► [u8; 12]
//!                                                        ▲
//!                                                  ButtonMapping
//! ```

pub mod buttons;
pub mod easing;
pub mod encoder;

pub use buttons::{ButtonMapping, KeyCode};
pub use easing::{AnalogEnvelope, AxisSettings, EasingType};
pub use encoder::{encode_sample, scale_tilt, Sample, TILT_LIMIT};
