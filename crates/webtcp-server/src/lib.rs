//! # webtcp-server
//!
//! Axum HTTP + `WebSocket` server that hands every client to a bridge session.
//!
//! - `WebSocket` upgrade on the configured path, one bridge session per client
//! - Heartbeat pings and a connection limit
//! - `/health` and Prometheus `/metrics` endpoints ([`metrics::install_recorder`])
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::WebTcpServer;
pub use shutdown::ShutdownCoordinator;
