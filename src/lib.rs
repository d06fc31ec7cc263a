//! Remote pedal/shifter control over UDP
//!
//! Drives a remote input receiver from a gamepad: samples are taken at a fixed
//! cadence, encoded into 12-byte DATA frames and sent over a small
//! connect / keepalive / disconnect protocol.
//!
//! ```text
//! controller ──► mapping ──► session ──► link ──► UDP ──► device
//!                              ▲
//!                            config
//! ```

pub mod config;
pub mod controller;
pub mod link;
pub mod mapping;
pub mod session;
