//! WebSocket client connection state and its [`Transport`] implementation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use webtcp_core::{ServerMessage, Transport};

use crate::metrics::WS_MESSAGES_DROPPED_TOTAL;

/// One connected WebSocket client, as seen by its bridge session.
pub struct WsTransport {
    /// Unique connection ID.
    pub id: String,
    /// Serialized messages for the writer task. Unbounded: a slow client
    /// grows the queue rather than losing socket data.
    tx: mpsc::UnboundedSender<String>,
    /// Cleared once the client closes or the writer stops.
    open: AtomicBool,
    /// When this connection was established.
    connected_at: Instant,
    /// Whether the client has shown activity since the last ping tick.
    is_alive: AtomicBool,
    /// When the last pong or other frame was received.
    last_seen: Mutex<Instant>,
    /// Messages sent after the writer task stopped.
    dropped_messages: AtomicU64,
}

impl WsTransport {
    /// Create an open transport.
    pub fn new(id: String, tx: mpsc::UnboundedSender<String>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            open: AtomicBool::new(true),
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Mark the client side closed. Later socket events are not forwarded.
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Record client activity.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the client was active since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the client was last heard from.
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Messages that could not be handed to the writer task.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl Transport for WsTransport {
    fn send(&self, message: ServerMessage) {
        if self.tx.send(message.to_json()).is_err() {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            counter!(WS_MESSAGES_DROPPED_TOTAL).increment(1);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}
