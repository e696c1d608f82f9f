//! The client-facing transport a session talks through.

use crate::protocol::ServerMessage;

/// Outbound half of a message transport (a WebSocket in the server).
pub trait Transport: Send + Sync {
    /// Deliver one message. Fire-and-forget.
    fn send(&self, message: ServerMessage);

    /// Whether `send` is currently expected to reach the client.
    fn is_open(&self) -> bool;
}

/// Inbound event from a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// One raw client message.
    Message(String),
    /// The transport closed; no further messages follow.
    Closed,
}
