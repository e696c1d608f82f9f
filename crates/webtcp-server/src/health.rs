//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Coarse server condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Accepting clients.
    Ok,
    /// At the connection limit; new upgrades get 503.
    Full,
    /// Shutdown started.
    Draining,
}

/// Live counters sampled for one health check.
#[derive(Clone, Copy, Debug, Default)]
pub struct Load {
    /// Open WebSocket clients.
    pub connections: usize,
    /// Configured client limit.
    pub max_connections: usize,
    /// TCP sockets held open for clients.
    pub active_sockets: usize,
    /// Whether shutdown has been requested.
    pub shutting_down: bool,
}

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// See [`HealthStatus`].
    pub status: HealthStatus,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Open WebSocket clients.
    pub connections: usize,
    /// Configured client limit.
    pub max_connections: usize,
    /// TCP sockets held open for clients.
    pub active_sockets: usize,
}

/// Build a health response from sampled counters.
pub fn health_check(start_time: Instant, load: Load) -> HealthResponse {
    let status = if load.shutting_down {
        HealthStatus::Draining
    } else if load.connections >= load.max_connections {
        HealthStatus::Full
    } else {
        HealthStatus::Ok
    };
    HealthResponse {
        status,
        uptime_secs: start_time.elapsed().as_secs(),
        connections: load.connections,
        max_connections: load.max_connections,
        active_sockets: load.active_sockets,
    }
}
