//! Socket events, commands, and the connector seam between a session and a
//! TCP driver.

use tokio::sync::mpsc;
use webtcp_core::TcpOptions;

/// Per-session socket sequence number.
pub type SocketId = u64;

/// Something that happened on a socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketEventKind {
    /// The handshake completed.
    Ready,
    /// Bytes read from the peer.
    Data(Vec<u8>),
    /// The peer half-closed.
    End,
    /// The socket is fully closed. Always the last event for a socket.
    Close {
        /// Whether an error caused the close.
        had_error: bool,
    },
    /// No activity for the configured idle timeout.
    Timeout,
    /// A socket error, as a platform-style code such as `ECONNREFUSED`.
    Error(String),
}

/// A socket event tagged with the socket it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocketEvent {
    /// Which socket.
    pub socket_id: SocketId,
    /// What happened.
    pub kind: SocketEventKind,
}

/// Sender half of a session's socket-event channel.
pub type EventSink = mpsc::UnboundedSender<SocketEvent>;

/// Instruction from a session to its socket driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketCommand {
    /// Queue bytes for writing.
    Write(Vec<u8>),
    /// Flush queued writes, then half-close.
    End,
    /// Tear down immediately.
    Destroy,
}

/// Session-side handle to one socket driver.
#[derive(Debug)]
pub struct SocketHandle {
    id: SocketId,
    commands: mpsc::UnboundedSender<SocketCommand>,
}

impl SocketHandle {
    /// Wrap a command sender.
    pub fn new(id: SocketId, commands: mpsc::UnboundedSender<SocketCommand>) -> Self {
        Self { id, commands }
    }

    /// The socket this handle controls.
    pub fn id(&self) -> SocketId {
        self.id
    }

    /// Queue bytes for writing.
    pub fn write(&self, bytes: Vec<u8>) {
        self.command(SocketCommand::Write(bytes));
    }

    /// Flush queued writes, then half-close.
    pub fn end(&self) {
        self.command(SocketCommand::End);
    }

    /// Tear down immediately.
    pub fn destroy(&self) {
        self.command(SocketCommand::Destroy);
    }

    // A driver that already exited has reported its final close event.
    fn command(&self, command: SocketCommand) {
        let _ = self.commands.send(command);
    }
}

/// Opens sockets on behalf of sessions.
///
/// `connect` must not block: it starts the connection and returns a handle.
/// Every event for the new socket, including the final
/// [`SocketEventKind::Close`], is delivered through `events`.
pub trait Connector: Send + Sync {
    /// Start connecting with the fully resolved `options`.
    fn connect(&self, id: SocketId, options: &TcpOptions, events: EventSink) -> SocketHandle;
}
