//! Control link subsystem
//!
//! Connection-oriented control protocol over UDP used to drive the remote
//! pedal/shifter receiver:
//!
//! 1. [`protocol`] - frame tags, reply codes and frame building
//! 2. [`error`] - error taxonomy shared by all link operations
//! 3. [`control_link`] - the session state machine owning the socket
//!
//! # Exchange Overview
//!
//! ```text
//! Client                        Device
//!   │── CONNECT 0x45 0x45 ───────►│
//!   │◄────── CONNECTION_SUCCESS ──│
//!   │── DATA (12 bytes) ─────────►│   (~50 Hz, unacknowledged)
//!   │── PING ────────────────────►│   (every read timeout)
//!   │◄──────────────────── PONG ──│
//!   │── DISCONNECT ──────────────►│
//!   │◄──────────── DISCONNECTED ──│
//! ```

pub mod control_link;
pub mod error;
pub mod protocol;

pub use control_link::{ConnectionState, ControlLink, Endpoint};
pub use error::{ErrorKind, Exchange, LinkError};
pub use protocol::{Message, Response, CONNECT_MAGIC, DATA_PAYLOAD_LEN, READ_TIMEOUT};
