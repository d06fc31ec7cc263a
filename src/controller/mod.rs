//! Controller subsystem for gamepad input handling
//!
//! Implements a two-stage pipeline:
//!
//! 1. [`collector`] - polls the gamepad on its own thread and keeps the latest input snapshot
//! 2. [`sampler`] - reads that snapshot once per transmission tick and shapes the pedals
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Collector ──watch──► Sampler ──► Sample
//!             (thread)             (session task, every 20 ms)
//! ```

pub mod collector;
pub mod sampler;

pub use collector::{CollectorError, CollectorHandle, CollectorSettings, Control, InputEvent};
pub use sampler::Sampler;
