//! WebSocket transport for bridge sessions.

pub mod connection;
pub mod session;

pub use connection::WsTransport;
pub use session::{Heartbeat, run_ws_session};
