//! `WebTcpServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;
use webtcp_bridge::{Bridge, BridgeConfig, TcpConnector};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse, Load};
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::{Heartbeat, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Session factory.
    pub bridge: Bridge,
    /// Socket connector shared with the bridge, for socket counts.
    pub connector: TcpConnector,
    /// Live WebSocket connections.
    pub connections: Arc<AtomicUsize>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Prometheus handle for `/metrics`.
    pub metrics: PrometheusHandle,
    /// When the server started.
    pub start_time: Instant,
}

/// The webtcp server.
pub struct WebTcpServer {
    state: AppState,
}

impl WebTcpServer {
    /// Create a server whose sessions share `bridge_config`.
    pub fn new(config: ServerConfig, bridge_config: BridgeConfig, metrics: PrometheusHandle) -> Self {
        let connector = TcpConnector::new();
        let bridge = Bridge::with_connector(bridge_config, Arc::new(connector.clone()));
        Self {
            state: AppState {
                config: Arc::new(config),
                bridge,
                connector,
                connections: Arc::new(AtomicUsize::new(0)),
                shutdown: Arc::new(ShutdownCoordinator::new()),
                metrics,
                start_time: Instant::now(),
            },
        }
    }

    /// Build the Axum router.
    ///
    /// The upgrade path comes from the configuration and must not collide
    /// with `/health` or `/metrics`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route(&self.state.config.path, get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind and serve in the background. The serve task is tracked by the
    /// shutdown coordinator.
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let config = &self.state.config;
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.state.shutdown.token();

        self.state.shutdown.track(tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(err) = served {
                error!(error = %err, "server stopped with error");
            }
        }));

        info!(%addr, path = %config.path, "webtcp server listening");
        Ok(addr)
    }

    /// Session factory used for every connection.
    pub fn bridge(&self) -> &Bridge {
        &self.state.bridge
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Live WebSocket connections.
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::Relaxed)
    }

    /// TCP sockets currently open on behalf of clients.
    pub fn active_sockets(&self) -> usize {
        self.state.connector.active_sockets()
    }
}

/// Holds one of the `max_connections` slots until dropped.
struct ConnectionSlot(Arc<AtomicUsize>);

impl ConnectionSlot {
    fn acquire(connections: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| Self(Arc::clone(connections)))
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        let _ = self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// GET on the configured path: WebSocket upgrade.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }
    let Some(slot) = ConnectionSlot::acquire(&state.connections, state.config.max_connections)
    else {
        warn!(max = state.config.max_connections, "connection limit reached, rejecting client");
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };

    let client_id = Uuid::now_v7().to_string();
    let heartbeat = Heartbeat {
        interval: state.config.heartbeat_interval(),
        timeout: state.config.heartbeat_timeout(),
    };
    let bridge = state.bridge.clone();
    let cancel = state.shutdown.token();

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            let _slot = slot;
            run_ws_session(socket, client_id, bridge, heartbeat, cancel).await;
        })
        .into_response()
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        Load {
            connections: state.connections.load(Ordering::Relaxed),
            max_connections: state.config.max_connections,
            active_sockets: state.connector.active_sockets(),
            shutting_down: state.shutdown.is_shutting_down(),
        },
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}
