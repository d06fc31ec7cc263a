//! Wire format of the control protocol
//!
//! One frame per datagram. Outbound frames are a single tag byte followed by an
//! optional payload; every inbound reply is exactly one byte.
//!
//! ```text
//! client → device                         device → client
//! ┌─────┬──────────────────────┐          ┌──────┐
//! │ tag │ payload (0, 2 or 12) │          │ code │
//! └─────┴──────────────────────┘          └──────┘
//! ```

use std::fmt;
use std::time::Duration;

/// Maximum time to wait for a reply to any request frame
pub const READ_TIMEOUT: Duration = Duration::from_millis(5000);

/// Fixed payload of the CONNECT frame
pub const CONNECT_MAGIC: [u8; 2] = [0x45, 0x45];

/// Size of the DATA frame payload
pub const DATA_PAYLOAD_LEN: usize = 12;

/// Frame types sent from the client to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Message {
    Connect = 1,
    Disconnect = 2,
    Data = 4,
    Ping = 8,
}

impl Message {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Reply codes sent from the device to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Response {
    ConnectionSuccess = 100,
    ConnectionFailure = 101,
    Disconnected = 200,
    Unsupported = 201,
    Pong = 202,
}

impl Response {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Response {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            100 => Ok(Self::ConnectionSuccess),
            101 => Ok(Self::ConnectionFailure),
            200 => Ok(Self::Disconnected),
            201 => Ok(Self::Unsupported),
            202 => Ok(Self::Pong),
            other => Err(other),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Response::ConnectionSuccess => "CONNECTION_SUCCESS",
            Response::ConnectionFailure => "CONNECTION_FAILURE",
            Response::Disconnected => "DISCONNECTED",
            Response::Unsupported => "UNSUPPORTED",
            Response::Pong => "PONG",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Builds a complete outbound frame: tag byte followed by the payload
pub fn build_frame(message: Message, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + payload.len());
    frame.push(message.tag());
    frame.extend_from_slice(payload);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_frame_carries_magic() {
        assert_eq!(build_frame(Message::Connect, &CONNECT_MAGIC), vec![1, 0x45, 0x45]);
    }

    #[test]
    fn control_frames_without_payload_are_single_byte() {
        assert_eq!(build_frame(Message::Disconnect, &[]), vec![2]);
        assert_eq!(build_frame(Message::Ping, &[]), vec![8]);
    }

    #[test]
    fn data_frame_prepends_tag() {
        let payload = [0u8, 0x41, 10, 20, 0x7f, 0xff, 0, 0, 0, 0, 0, 0];
        let frame = build_frame(Message::Data, &payload);
        assert_eq!(frame.len(), 1 + DATA_PAYLOAD_LEN);
        assert_eq!(frame[0], 4);
        assert_eq!(&frame[1..], &payload);
    }

    #[test]
    fn unknown_response_code_is_rejected() {
        assert_eq!(Response::try_from(202), Ok(Response::Pong));
        assert_eq!(Response::try_from(201), Ok(Response::Unsupported));
        assert_eq!(Response::try_from(7), Err(7));
        assert_eq!(Response::try_from(0), Err(0));
    }
}
