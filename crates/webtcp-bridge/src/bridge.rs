//! Session factory and per-session task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, instrument};
use webtcp_core::{Transport, TransportEvent};

use crate::config::{BridgeConfig, BridgeOptions};
use crate::session::Session;
use crate::socket::{Connector, SocketEvent};
use crate::tcp::TcpConnector;

/// Builds sessions that share one read-only configuration.
#[derive(Clone)]
pub struct Bridge {
    config: Arc<BridgeConfig>,
    connector: Arc<dyn Connector>,
}

impl Bridge {
    /// Bridge that opens real TCP sockets.
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_connector(config, Arc::new(TcpConnector::new()))
    }

    /// Bridge built from partial options over the defaults.
    pub fn from_options(options: BridgeOptions) -> Self {
        Self::new(BridgeConfig::default().with_options(options))
    }

    /// Bridge with a custom socket connector.
    pub fn with_connector(config: BridgeConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }

    /// Shared configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Create a session for `transport` along with the receiver for its
    /// socket events.
    pub fn session(
        &self,
        transport: Arc<dyn Transport>,
    ) -> (Session, mpsc::UnboundedReceiver<SocketEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(
            transport,
            Arc::clone(&self.config),
            Arc::clone(&self.connector),
            tx,
        );
        (session, rx)
    }

    /// Wire a transport to a fresh session and run it on its own task.
    ///
    /// The task ends when `inbound` yields [`TransportEvent::Closed`] or is
    /// dropped.
    pub fn handle(
        &self,
        transport: Arc<dyn Transport>,
        inbound: mpsc::Receiver<TransportEvent>,
    ) -> JoinHandle<()> {
        let (session, events) = self.session(transport);
        tokio::spawn(run_session(session, inbound, events))
    }
}

/// Drive one session until its transport closes.
///
/// Client messages and socket events are handled one at a time, each source
/// in arrival order.
#[instrument(skip_all, fields(session_id = %session.id()))]
pub async fn run_session(
    mut session: Session,
    mut inbound: mpsc::Receiver<TransportEvent>,
    mut events: mpsc::UnboundedReceiver<SocketEvent>,
) {
    info!("session started");
    loop {
        tokio::select! {
            event = inbound.recv() => match event {
                Some(TransportEvent::Message(raw)) => session.dispatch(&raw),
                Some(TransportEvent::Closed) | None => {
                    session.close();
                    break;
                }
            },
            Some(event) = events.recv() => session.handle_socket_event(event),
        }
    }
    info!("session ended");
}
