//! # webtcp-bridge
//!
//! The per-session protocol bridge. A [`Session`] owns at most one outbound
//! TCP socket for one client transport; a [`Bridge`] shares configuration
//! across sessions and runs each on its own task.
//!
//! Sockets are driven by a [`Connector`]. [`TcpConnector`] opens real
//! connections; tests substitute their own.

#![deny(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod session;
pub mod socket;
pub mod tcp;

pub use bridge::{Bridge, run_session};
pub use config::{BridgeConfig, BridgeOptions};
pub use session::{Session, SessionState};
pub use socket::{
    Connector, EventSink, SocketCommand, SocketEvent, SocketEventKind, SocketHandle, SocketId,
};
pub use tcp::{TcpConnector, error_code};
