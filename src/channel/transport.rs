//! Transport abstraction for the tracking channel.
//!
//! The channel supervisor is transport-agnostic: anything that can open a
//! connection, manage trip-group membership and exchange location frames
//! works. Tests script [`TripTransport`] implementations to exercise the
//! reconnect machinery; production uses [`super::TcpTransport`].

use std::future::Future;

use thiserror::Error;

use super::state::LocationUpdate;

/// Errors surfaced by a transport.
///
/// All of these are transient from the channel's point of view: the
/// supervisor reacts by reconnecting, never by propagating upward.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Establishing the connection failed.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// A write to the connection failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// A read from the connection failed.
    #[error("Receive failed: {0}")]
    RecvFailed(String),

    /// The peer closed the connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// An inbound frame could not be parsed.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
}

/// An inbound message from the tracking service.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// A participant in a joined trip group broadcast their position.
    PeerLocation {
        trip_id: String,
        update: LocationUpdate,
    },
}

/// Factory for tracking connections.
pub trait TripTransport: Send + Sync + 'static {
    type Conn: TripConnection;

    /// Open a fresh connection to the tracking service.
    fn connect(&self) -> impl Future<Output = Result<Self::Conn, TransportError>> + Send;
}

/// One live connection to the tracking service.
pub trait TripConnection: Send + 'static {
    /// Enter a trip's broadcast group. Idempotent on the server.
    fn join(&mut self, trip_id: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Leave a trip's broadcast group. Idempotent on the server.
    fn leave(&mut self, trip_id: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Publish a location update to a trip group. Best-effort; an error
    /// means the connection is gone.
    fn send_location(
        &mut self,
        trip_id: &str,
        update: &LocationUpdate,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next inbound message.
    fn recv(&mut self) -> impl Future<Output = Result<InboundMessage, TransportError>> + Send;
}
