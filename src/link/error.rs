//! Error taxonomy of the control link

use super::protocol::Response;
use std::fmt;
use thiserror::Error;

/// Protocol exchange an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Connect,
    Emit,
    Ping,
    Disconnect,
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Exchange::Connect => "connect",
            Exchange::Emit => "emit",
            Exchange::Ping => "ping",
            Exchange::Disconnect => "disconnect",
        };
        f.write_str(name)
    }
}

/// Coarse classification of a [`LinkError`]
///
/// Callers decide how to react by kind rather than by variant:
///
/// * `PreconditionViolation` - caller bug, surfaced immediately
/// * `TransportFailure` - network layer failed, recoverable by reconnecting
/// * `ProtocolViolation` - the device answered with something unexpected, fatal for the session
/// * `Rejected` - the device refused the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PreconditionViolation,
    TransportFailure,
    ProtocolViolation,
    Rejected,
}

/// Errors returned by [`ControlLink`](super::ControlLink) operations
///
/// The link never retries; every failure is handed back to the caller.
#[derive(Debug, Error)]
pub enum LinkError {
    /// `connect` was called on a link that already has a session
    #[error("Already connected to the device.")]
    AlreadyConnected,

    /// `emit`, `ping` or `disconnect` was called without a session
    #[error("Cannot {0}, not connected to the device.")]
    NotConnected(Exchange),

    /// The configured host did not resolve to any address
    #[error("Could not resolve device address {host}: {reason}")]
    Unresolvable { host: String, reason: String },

    /// Creating or binding the local socket failed
    #[error("Not connected to the network.")]
    SocketSetup(#[source] std::io::Error),

    /// The datagram could not be handed to the network
    #[error("Not connected to the network.")]
    SendFailed(#[source] std::io::Error),

    /// No reply arrived within the read timeout
    #[error("No response received from device.")]
    NoResponse,

    /// The receive itself failed, e.g. the peer port is unreachable
    #[error("No response received from device.")]
    ReceiveFailed(#[source] std::io::Error),

    /// The device refused the session
    #[error("Connection refused by device.")]
    Rejected,

    /// A reply arrived but it is not one of the known codes
    #[error("Response code {0} is invalid.")]
    InvalidResponse(u8),

    /// A zero-length datagram arrived where a reply code was expected
    #[error("Received an empty response from device.")]
    EmptyResponse,

    /// The device answered with a known code that does not fit the exchange
    #[error("Unexpected response {response} to {exchange}.")]
    UnexpectedResponse {
        exchange: Exchange,
        response: Response,
    },

    /// The device reported it does not support the request
    #[error("Device does not support {0}.")]
    Unsupported(Exchange),
}

impl LinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkError::AlreadyConnected | LinkError::NotConnected(_) => {
                ErrorKind::PreconditionViolation
            }
            LinkError::Unresolvable { .. }
            | LinkError::SocketSetup(_)
            | LinkError::SendFailed(_)
            | LinkError::NoResponse
            | LinkError::ReceiveFailed(_) => ErrorKind::TransportFailure,
            LinkError::InvalidResponse(_)
            | LinkError::EmptyResponse
            | LinkError::UnexpectedResponse { .. }
            | LinkError::Unsupported(_) => ErrorKind::ProtocolViolation,
            LinkError::Rejected => ErrorKind::Rejected,
        }
    }

    /// True when the device broke the protocol and the session must not be reused
    ///
    /// Transport failures are not fatal: the caller may reconnect.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::ProtocolViolation
    }
}
