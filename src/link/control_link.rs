//! Control link - session over a single UDP socket
//!
//! Owns the socket bound to one remote device and drives the
//! connect / keepalive / disconnect handshake on top of it.
//!
//! # State Machine
//!
//! ```text
//!          connect (CONNECTION_SUCCESS)
//!   Idle ─────────────────────────────────► Connected
//!    ▲                                          │
//!    └──────────────────────────────────────────┘
//!          disconnect (DISCONNECTED) / release
//! ```
//!
//! The socket only exists in `Connected`. A failed `connect` drops it again,
//! so nothing stays bound to the device after an error.
//!
//! # Concurrency
//!
//! Request/response exchanges (`connect`, `ping`, `disconnect`) are serialised
//! by an internal lock because the reply reader assumes the next inbound datagram
//! answers the most recent request. `emit` bypasses that lock: it sends and returns.

use super::error::{Exchange, LinkError};
use super::protocol::{
    build_frame, Message, Response, CONNECT_MAGIC, DATA_PAYLOAD_LEN, READ_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Address of a remote device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// IPv4/IPv6 literal or hostname
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Observable state of a [`ControlLink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connected,
}

#[derive(Debug)]
struct Connection {
    socket: UdpSocket,
    peer: SocketAddr,
}

#[derive(Debug)]
enum LinkState {
    Idle,
    Connected(Arc<Connection>),
}

impl LinkState {
    fn connection(&self) -> Option<Arc<Connection>> {
        match self {
            LinkState::Idle => None,
            LinkState::Connected(connection) => Some(connection.clone()),
        }
    }
}

#[derive(Debug)]
pub struct ControlLink {
    endpoint: Endpoint,
    read_timeout: Duration,
    state: Mutex<LinkState>,
    exchange: Mutex<()>,
}

impl ControlLink {
    pub fn new(endpoint: Endpoint, read_timeout: Duration) -> Self {
        debug!(
            "Creating control link for {} with read timeout {:?}",
            endpoint, read_timeout
        );
        Self {
            endpoint,
            read_timeout,
            state: Mutex::new(LinkState::Idle),
            exchange: Mutex::new(()),
        }
    }

    pub fn with_default_timeout(endpoint: Endpoint) -> Self {
        Self::new(endpoint, READ_TIMEOUT)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub async fn state(&self) -> ConnectionState {
        match *self.state.lock().await {
            LinkState::Idle => ConnectionState::Idle,
            LinkState::Connected(_) => ConnectionState::Connected,
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Resolved address of the device while connected
    pub async fn peer_addr(&self) -> Option<SocketAddr> {
        self.state
            .lock()
            .await
            .connection()
            .map(|connection| connection.peer)
    }

    /// Opens a session with the device
    ///
    /// Resolves the host, binds a fresh socket to the resolved address and sends
    /// CONNECT. Blocks until the device answers or the read timeout elapses.
    ///
    /// # Errors
    ///
    /// * [`LinkError::AlreadyConnected`] - a session is already open, the socket is untouched
    /// * [`LinkError::Rejected`] - the device answered CONNECTION_FAILURE
    /// * transport errors if resolution, send or receive fail
    /// * protocol errors for any other reply
    pub async fn connect(&self) -> Result<(), LinkError> {
        let _exchange = self.exchange.lock().await;

        if matches!(*self.state.lock().await, LinkState::Connected(_)) {
            warn!("Connect requested while already connected to {}", self.endpoint);
            return Err(LinkError::AlreadyConnected);
        }

        let peer = self.resolve().await?;
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local)
            .await
            .map_err(LinkError::SocketSetup)?;
        socket.connect(peer).await.map_err(LinkError::SocketSetup)?;
        let connection = Connection { socket, peer };
        debug!("Socket bound to {}", peer);

        self.send(&connection, Message::Connect, &CONNECT_MAGIC).await?;

        match self.receive(&connection).await? {
            Response::ConnectionSuccess => {
                *self.state.lock().await = LinkState::Connected(Arc::new(connection));
                info!("Connected to {} ({})", self.endpoint, peer);
                Ok(())
            }
            Response::ConnectionFailure => {
                warn!("Connection refused by {}", self.endpoint);
                Err(LinkError::Rejected)
            }
            Response::Unsupported => Err(LinkError::Unsupported(Exchange::Connect)),
            response => Err(LinkError::UnexpectedResponse {
                exchange: Exchange::Connect,
                response,
            }),
        }
    }

    /// Sends one DATA frame without waiting for any reply
    ///
    /// Delivery and ordering are whatever UDP gives; nothing is retransmitted.
    pub async fn emit(&self, payload: &[u8; DATA_PAYLOAD_LEN]) -> Result<(), LinkError> {
        let connection = self.connection(Exchange::Emit).await?;
        self.send(&connection, Message::Data, payload).await
    }

    /// Keepalive: sends PING and requires PONG within the read timeout
    pub async fn ping(&self) -> Result<(), LinkError> {
        let _exchange = self.exchange.lock().await;
        let connection = self.connection(Exchange::Ping).await?;
        self.discard_stale(&connection);

        self.send(&connection, Message::Ping, &[]).await?;
        match self.receive(&connection).await? {
            Response::Pong => {
                debug!("PONG from {}", self.endpoint);
                Ok(())
            }
            Response::Unsupported => Err(LinkError::Unsupported(Exchange::Ping)),
            response => Err(LinkError::UnexpectedResponse {
                exchange: Exchange::Ping,
                response,
            }),
        }
    }

    /// Closes the session, requiring DISCONNECTED as acknowledgment
    ///
    /// The link only returns to idle when the device confirmed. Use
    /// [`release`](Self::release) afterwards to drop the session regardless.
    pub async fn disconnect(&self) -> Result<(), LinkError> {
        let _exchange = self.exchange.lock().await;
        let connection = self.connection(Exchange::Disconnect).await?;
        self.discard_stale(&connection);

        self.send(&connection, Message::Disconnect, &[]).await?;
        match self.receive(&connection).await? {
            Response::Disconnected => {
                *self.state.lock().await = LinkState::Idle;
                info!("Disconnected from {}", self.endpoint);
                Ok(())
            }
            Response::Unsupported => Err(LinkError::Unsupported(Exchange::Disconnect)),
            response => Err(LinkError::UnexpectedResponse {
                exchange: Exchange::Disconnect,
                response,
            }),
        }
    }

    /// Drops the session without talking to the device
    ///
    /// Waits for a running exchange to finish first. Returns whether a session was open.
    pub async fn release(&self) -> bool {
        let _exchange = self.exchange.lock().await;
        let previous = std::mem::replace(&mut *self.state.lock().await, LinkState::Idle);
        let was_connected = matches!(previous, LinkState::Connected(_));
        if was_connected {
            debug!("Released socket for {}", self.endpoint);
        }
        was_connected
    }

    async fn connection(&self, exchange: Exchange) -> Result<Arc<Connection>, LinkError> {
        self.state
            .lock()
            .await
            .connection()
            .ok_or(LinkError::NotConnected(exchange))
    }

    async fn resolve(&self) -> Result<SocketAddr, LinkError> {
        let unresolvable = |reason: String| LinkError::Unresolvable {
            host: self.endpoint.host.clone(),
            reason,
        };

        let target = (self.endpoint.host.as_str(), self.endpoint.port);
        let mut addresses = tokio::net::lookup_host(target)
            .await
            .map_err(|e| unresolvable(e.to_string()))?;

        addresses
            .next()
            .ok_or_else(|| unresolvable("no addresses found".to_string()))
    }

    async fn send(
        &self,
        connection: &Connection,
        message: Message,
        payload: &[u8],
    ) -> Result<(), LinkError> {
        let frame = build_frame(message, payload);
        connection
            .socket
            .send(&frame)
            .await
            .map_err(LinkError::SendFailed)?;
        debug!(
            "Sent {:?} frame ({} bytes) to {}",
            message,
            frame.len(),
            connection.peer
        );
        Ok(())
    }

    /// Drops replies that arrived after their exchange timed out or was cancelled
    ///
    /// Only datagrams the runtime has already seen are discarded, so a reply that
    /// is still in flight can still be mistaken for the next answer.
    fn discard_stale(&self, connection: &Connection) {
        let mut buffer = [0u8; 1];
        loop {
            match connection.socket.try_recv(&mut buffer) {
                Ok(0) => debug!("Discarded empty datagram from {}", connection.peer),
                Ok(_) => debug!(
                    "Discarded stale reply {} from {}",
                    buffer[0], connection.peer
                ),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!("Pending socket error from {}: {}", connection.peer, e);
                    break;
                }
            }
        }
    }

    async fn receive(&self, connection: &Connection) -> Result<Response, LinkError> {
        let mut buffer = [0u8; 1];
        let received =
            tokio::time::timeout(self.read_timeout, connection.socket.recv(&mut buffer)).await;

        let len = match received {
            Ok(Ok(len)) => len,
            Ok(Err(e)) => {
                debug!("Receive from {} failed: {}", connection.peer, e);
                return Err(LinkError::ReceiveFailed(e));
            }
            Err(_) => {
                debug!(
                    "No reply from {} within {:?}",
                    connection.peer, self.read_timeout
                );
                return Err(LinkError::NoResponse);
            }
        };

        if len == 0 {
            return Err(LinkError::EmptyResponse);
        }

        let response = Response::try_from(buffer[0]).map_err(LinkError::InvalidResponse)?;
        debug!("Received {} from {}", response, connection.peer);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_displays_as_host_and_port() {
        assert_eq!(
            Endpoint::new("192.168.4.1", 4210).to_string(),
            "192.168.4.1:4210"
        );
    }

    #[tokio::test]
    async fn new_link_starts_idle() {
        let link = ControlLink::with_default_timeout(Endpoint::new("127.0.0.1", 9));
        assert_eq!(link.state().await, ConnectionState::Idle);
        assert_eq!(link.read_timeout(), READ_TIMEOUT);
        assert!(link.peer_addr().await.is_none());
    }

    #[tokio::test]
    async fn release_on_idle_link_is_a_no_op() {
        let link = ControlLink::with_default_timeout(Endpoint::new("127.0.0.1", 9));
        assert!(!link.release().await);
        assert!(!link.is_connected().await);
    }
}
