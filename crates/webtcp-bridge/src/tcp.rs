//! Tokio-backed TCP socket driver.
//!
//! Each socket runs in its own task that performs the connect, reads, buffered
//! writes, idle-timeout tracking, and shutdown, reporting everything back to
//! the owning session as [`SocketEvent`]s.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use metrics::{counter, gauge};
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep, sleep};
use tracing::{debug, warn};
use webtcp_core::TcpOptions;

use crate::socket::{
    Connector, EventSink, SocketCommand, SocketEvent, SocketEventKind, SocketHandle, SocketId,
};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// [`Connector`] that opens real TCP connections.
#[derive(Clone, Debug, Default)]
pub struct TcpConnector {
    active: Arc<AtomicUsize>,
}

impl TcpConnector {
    /// Create a connector with no live sockets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of socket drivers still running.
    pub fn active_sockets(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

impl Connector for TcpConnector {
    fn connect(&self, id: SocketId, options: &TcpOptions, events: EventSink) -> SocketHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let guard = ActiveSocket::enter(Arc::clone(&self.active));
        let options = options.clone();
        drop(tokio::spawn(async move {
            let _guard = guard;
            drive_socket(id, options, events, rx).await;
        }));
        SocketHandle::new(id, tx)
    }
}

struct ActiveSocket(Arc<AtomicUsize>);

impl ActiveSocket {
    fn enter(active: Arc<AtomicUsize>) -> Self {
        let _ = active.fetch_add(1, Ordering::Relaxed);
        counter!("tcp_sockets_opened_total").increment(1);
        gauge!("tcp_sockets_active").increment(1.0);
        Self(active)
    }
}

impl Drop for ActiveSocket {
    fn drop(&mut self) {
        let _ = self.0.fetch_sub(1, Ordering::Relaxed);
        gauge!("tcp_sockets_active").decrement(1.0);
    }
}

/// Map an I/O error to the platform-style code reported to clients.
pub fn error_code(err: &io::Error) -> &'static str {
    use io::ErrorKind;
    match err.kind() {
        ErrorKind::ConnectionRefused => "ECONNREFUSED",
        ErrorKind::ConnectionReset => "ECONNRESET",
        ErrorKind::ConnectionAborted => "ECONNABORTED",
        ErrorKind::TimedOut => "ETIMEDOUT",
        ErrorKind::BrokenPipe => "EPIPE",
        ErrorKind::HostUnreachable => "EHOSTUNREACH",
        ErrorKind::NetworkUnreachable => "ENETUNREACH",
        ErrorKind::AddrNotAvailable => "EADDRNOTAVAIL",
        ErrorKind::AddrInUse => "EADDRINUSE",
        _ => "EIO",
    }
}

#[derive(Debug)]
enum ConnectFailure {
    Resolve,
    Io(io::Error),
}

impl ConnectFailure {
    fn code(&self) -> &'static str {
        match self {
            Self::Resolve => "ENOTFOUND",
            Self::Io(err) => error_code(err),
        }
    }
}

/// Resolve `host` and try each address in turn.
async fn open_stream(host: &str, port: u16) -> Result<TcpStream, ConnectFailure> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| ConnectFailure::Resolve)?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.map_or(ConnectFailure::Resolve, ConnectFailure::Io))
}

fn configure(stream: &TcpStream, options: &TcpOptions) -> io::Result<()> {
    stream.set_nodelay(options.no_delay)?;
    if options.keep_alive {
        let mut keepalive = TcpKeepalive::new();
        if let Some(delay) = options.keep_alive_delay() {
            keepalive = keepalive.with_time(delay);
        }
        SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
    }
    Ok(())
}

fn rearm(timer: Pin<&mut Sleep>, idle: Option<Duration>) {
    if let Some(idle) = idle {
        timer.reset(Instant::now() + idle);
    }
}

async fn drive_socket(
    id: SocketId,
    options: TcpOptions,
    events: EventSink,
    mut commands: mpsc::UnboundedReceiver<SocketCommand>,
) {
    let emit = |kind: SocketEventKind| {
        let _ = events.send(SocketEvent {
            socket_id: id,
            kind,
        });
    };

    // Writes and an end request can arrive before the handshake finishes.
    let mut pending = BytesMut::new();
    let mut end_requested = false;
    // Once the owning session is gone, flush and half-close without waiting
    // for the peer.
    let mut commands_open = true;

    let connect = open_stream(&options.host, options.port);
    tokio::pin!(connect);
    let stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok(stream) => break stream,
                Err(failure) => {
                    debug!(
                        socket_id = id,
                        host = %options.host,
                        port = options.port,
                        code = failure.code(),
                        "connect failed"
                    );
                    emit(SocketEventKind::Error(failure.code().to_owned()));
                    emit(SocketEventKind::Close { had_error: true });
                    return;
                }
            },
            command = commands.recv(), if commands_open => match command {
                Some(SocketCommand::Write(bytes)) => {
                    if end_requested {
                        debug!(socket_id = id, len = bytes.len(), "write after end");
                        emit(SocketEventKind::Error("EPIPE".to_owned()));
                    } else {
                        pending.extend_from_slice(&bytes);
                    }
                }
                Some(SocketCommand::End) => end_requested = true,
                Some(SocketCommand::Destroy) => {
                    emit(SocketEventKind::Close { had_error: false });
                    return;
                }
                None => {
                    commands_open = false;
                    end_requested = true;
                }
            },
        }
    };

    if let Err(err) = configure(&stream, &options) {
        warn!(socket_id = id, error = %err, "failed to apply socket options");
    }
    emit(SocketEventKind::Ready);

    // Idleness is measured from the handshake, not from the connect call.
    let idle = options.idle_timeout();
    let timer = sleep(idle.unwrap_or_default());
    tokio::pin!(timer);

    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut reading = true;
    let mut writing = true;

    let failure = loop {
        if end_requested && writing && pending.is_empty() {
            if let Err(err) = writer.shutdown().await {
                break err;
            }
            writing = false;
        }
        if !writing && (!reading || !commands_open) {
            emit(SocketEventKind::Close { had_error: false });
            return;
        }

        tokio::select! {
            result = reader.read(&mut buf), if reading => match result {
                Ok(0) => {
                    // A peer half-close is not kept half-open.
                    reading = false;
                    end_requested = true;
                    emit(SocketEventKind::End);
                }
                Ok(n) => {
                    rearm(timer.as_mut(), idle);
                    emit(SocketEventKind::Data(buf[..n].to_vec()));
                }
                Err(err) => break err,
            },
            result = writer.write(&pending[..]), if writing && !pending.is_empty() => match result {
                Ok(0) => break io::ErrorKind::WriteZero.into(),
                Ok(n) => {
                    pending.advance(n);
                    rearm(timer.as_mut(), idle);
                }
                Err(err) => break err,
            },
            command = commands.recv(), if commands_open => match command {
                Some(SocketCommand::Write(bytes)) => {
                    if writing && !end_requested {
                        pending.extend_from_slice(&bytes);
                    } else {
                        debug!(socket_id = id, len = bytes.len(), "write after end");
                        emit(SocketEventKind::Error("EPIPE".to_owned()));
                    }
                }
                Some(SocketCommand::End) => end_requested = true,
                Some(SocketCommand::Destroy) => {
                    emit(SocketEventKind::Close { had_error: false });
                    return;
                }
                None => {
                    commands_open = false;
                    end_requested = true;
                }
            },
            () = &mut timer, if idle.is_some() => {
                if !commands_open {
                    debug!(socket_id = id, "idle after owner left, dropping socket");
                    return;
                }
                emit(SocketEventKind::Timeout);
                rearm(timer.as_mut(), idle);
            }
        }
    };

    debug!(socket_id = id, error = %failure, "socket error");
    emit(SocketEventKind::Error(error_code(&failure).to_owned()));
    emit(SocketEventKind::Close { had_error: true });
}
