use crate::link::{ConnectionState, Endpoint, ErrorKind, Exchange, LinkError};
use chrono::{DateTime, Local};
use std::fmt;

/// Notifications for whoever presents the session to the user
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected(Endpoint),
    /// User-facing description of what went wrong
    Failed(String),
    Disconnected(Endpoint),
}

/// Live counters of a running session
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub connection_state: ConnectionState,
    pub frames_sent: u64,
    pub pings_answered: u64,
    pub connected_at: Option<DateTime<Local>>,
    pub last_keepalive: Option<DateTime<Local>>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            connection_state: ConnectionState::Idle,
            frames_sent: 0,
            pings_answered: 0,
            connected_at: None,
            last_keepalive: None,
        }
    }
}

/// Why a session stopped running
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// The owner asked for shutdown
    Cancelled,
    /// A link operation failed inside one of the periodic loops
    Failed {
        during: Exchange,
        kind: ErrorKind,
        /// The device broke the protocol; reconnecting is not expected to help
        fatal: bool,
        message: String,
    },
}

impl SessionEnd {
    pub fn failed(during: Exchange, error: &LinkError) -> Self {
        SessionEnd::Failed {
            during,
            kind: error.kind(),
            fatal: error.is_fatal(),
            message: error.to_string(),
        }
    }

    /// Whether the owner may `reopen` and connect again
    pub fn is_recoverable(&self) -> bool {
        match self {
            SessionEnd::Cancelled => true,
            SessionEnd::Failed { fatal, .. } => !fatal,
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Cancelled => f.write_str("session cancelled"),
            SessionEnd::Failed {
                during, message, ..
            } => write!(f, "{} failed: {}", during, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_leave_the_session_recoverable() {
        let end = SessionEnd::failed(Exchange::Ping, &LinkError::NoResponse);
        assert!(end.is_recoverable());
        assert_eq!(
            end.to_string(),
            "ping failed: No response received from device."
        );
    }

    #[test]
    fn protocol_violations_are_not_recoverable() {
        let end = SessionEnd::failed(Exchange::Ping, &LinkError::Unsupported(Exchange::Ping));
        assert!(matches!(
            end,
            SessionEnd::Failed {
                kind: ErrorKind::ProtocolViolation,
                fatal: true,
                ..
            }
        ));
        assert!(!end.is_recoverable());
        assert!(SessionEnd::Cancelled.is_recoverable());
    }
}
