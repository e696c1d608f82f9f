//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use webtcp_bridge::Bridge;
use webtcp_core::TransportEvent;

use super::connection::WsTransport;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Inbound messages buffered before the reader waits on the session.
const INBOUND_QUEUE: usize = 256;

/// Ping timing for one connection.
#[derive(Clone, Copy, Debug)]
pub struct Heartbeat {
    /// Interval between server pings.
    pub interval: Duration,
    /// Silence after which the client is dropped.
    pub timeout: Duration,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Hands the client to a fresh bridge session
/// 2. Forwards text (and UTF-8 binary) frames to the session
/// 3. Writes session messages back and sends periodic Ping frames
/// 4. Disconnects unresponsive clients and stops on server shutdown
/// 5. Reports the transport closed so the session ends its socket
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: String,
    bridge: Bridge,
    heartbeat: Heartbeat,
    cancel: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::unbounded_channel::<String>();
    let transport = Arc::new(WsTransport::new(client_id.clone(), send_tx));
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
    let session = bridge.handle(transport.clone(), inbound_rx);

    let connection_start = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Outbound forwarder with periodic Ping frames.
    let outbound_conn = transport.clone();
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat.interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_seen_elapsed() > heartbeat.timeout
                    {
                        warn!("client unresponsive for {:?}, disconnecting", heartbeat.timeout);
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            _ = &mut outbound => break,
            () = cancel.cancelled() => {
                info!("server shutting down, closing client");
                break;
            }
        };
        let Some(Ok(frame)) = frame else { break };
        transport.mark_alive();

        let text = match frame {
            Message::Text(text) => text.to_string(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if inbound_tx.send(TransportEvent::Message(text)).await.is_err() {
            break;
        }
    }

    // Socket events from here on are not forwarded.
    transport.mark_closed();
    let _ = inbound_tx.send(TransportEvent::Closed).await;
    drop(inbound_tx);
    if let Err(err) = session.await {
        warn!(error = %err, "bridge session task failed");
    }
    outbound.abort();

    info!(
        dropped = transport.drop_count(),
        age_secs = transport.age().as_secs(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());
}
