//! Session ownership on top of the control link
//!
//! The link itself never retries and never tears itself down. This module is
//! the caller-side policy around it:
//!
//! - [`runner`] - the `Session` typestate machine, transmission and keepalive loops,
//!   and the cancellation-proof teardown
//! - [`events`] - notifications and status published to the user-facing side

pub mod events;
pub mod runner;

pub use events::{SessionEnd, SessionEvent, SessionStatus};
pub use runner::{spawn_teardown, Session, SessionSettings};
