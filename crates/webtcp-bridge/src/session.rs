//! One client's protocol session: parses client messages, owns at most one
//! TCP socket, and translates socket events into client messages.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;
use webtcp_core::{
    ClientMessage, Encoding, Payload, ServerMessage, SessionError, StreamDecoder, TcpOptionsOverride,
    Transport,
};

use crate::config::BridgeConfig;
use crate::socket::{Connector, EventSink, SocketEvent, SocketEventKind, SocketHandle, SocketId};

/// Protocol-visible state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No socket. Initial state, and the state after every socket closes.
    Disconnected,
    /// A socket exists and has not finished its handshake.
    Connecting,
    /// A socket exists and is ready.
    Connected,
}

#[derive(Debug)]
struct SocketBinding {
    handle: SocketHandle,
    ready: bool,
    encoding: Encoding,
    decoder: StreamDecoder,
}

/// State machine for one client transport.
///
/// Not thread-safe by itself: the owning task feeds it client messages and
/// socket events one at a time.
pub struct Session {
    id: String,
    transport: Arc<dyn Transport>,
    config: Arc<BridgeConfig>,
    connector: Arc<dyn Connector>,
    events: EventSink,
    socket: Option<SocketBinding>,
    last_socket_id: SocketId,
}

impl Session {
    /// Create a disconnected session. Socket events for this session must be
    /// sent to `events` and fed back through [`Session::handle_socket_event`].
    pub fn new(
        transport: Arc<dyn Transport>,
        config: Arc<BridgeConfig>,
        connector: Arc<dyn Connector>,
        events: EventSink,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            transport,
            config,
            connector,
            events,
            socket: None,
            last_socket_id: 0,
        }
    }

    /// Session ID used in log fields.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        match &self.socket {
            None => SessionState::Disconnected,
            Some(binding) if binding.ready => SessionState::Connected,
            Some(_) => SessionState::Connecting,
        }
    }

    /// Whether a socket is bound (connecting, connected, or closing).
    pub fn has_socket(&self) -> bool {
        self.socket.is_some()
    }

    /// Handle one raw client message.
    pub fn dispatch(&mut self, raw: &str) {
        let message = match ClientMessage::parse(raw) {
            Ok(message) => message,
            Err(err) => {
                if self.config.debug {
                    debug!(session_id = %self.id, error = %err, "rejected message");
                }
                self.reply(ServerMessage::error(err.to_string()));
                return;
            }
        };

        if self.config.debug {
            debug!(
                session_id = %self.id,
                kind = message.kind(),
                has_socket = self.socket.is_some(),
                "got message"
            );
        }

        match message {
            ClientMessage::Connect(overrides) => self.connect(&overrides),
            ClientMessage::Data(payload) => self.write(payload),
            ClientMessage::Close => self.end_socket(),
        }
    }

    /// The client transport closed. Ends the socket, if any, without a reply.
    pub fn close(&mut self) {
        if let Some(binding) = &self.socket {
            if self.config.debug {
                debug!(session_id = %self.id, socket_id = binding.handle.id(), "closing connection");
            }
            binding.handle.end();
        }
    }

    /// Translate one socket event into client messages.
    pub fn handle_socket_event(&mut self, event: SocketEvent) {
        let debug_enabled = self.config.debug;
        let Some(binding) = self
            .socket
            .as_mut()
            .filter(|binding| binding.handle.id() == event.socket_id)
        else {
            if debug_enabled {
                debug!(session_id = %self.id, socket_id = event.socket_id, "ignoring stale socket event");
            }
            return;
        };
        let transport = self.transport.as_ref();

        match event.kind {
            SocketEventKind::Ready => {
                if debug_enabled {
                    debug!(session_id = %self.id, socket_id = event.socket_id, "socket ready");
                }
                binding.ready = true;
                send_if_open(transport, ServerMessage::Connect);
            }
            SocketEventKind::Data(bytes) => {
                if debug_enabled {
                    debug!(session_id = %self.id, socket_id = event.socket_id, len = bytes.len(), "socket data");
                }
                let payload = binding.decoder.write(&bytes);
                if !payload.is_empty() {
                    send_if_open(transport, ServerMessage::Data { payload });
                }
            }
            SocketEventKind::End => {
                if debug_enabled {
                    debug!(session_id = %self.id, socket_id = event.socket_id, "socket end");
                }
                let rest = binding.decoder.end();
                if !rest.is_empty() {
                    send_if_open(transport, ServerMessage::Data { payload: rest });
                }
                send_if_open(transport, ServerMessage::End);
            }
            SocketEventKind::Timeout => {
                if debug_enabled {
                    debug!(session_id = %self.id, socket_id = event.socket_id, "socket timeout");
                }
                binding.handle.destroy();
                transport.send(ServerMessage::Timeout);
            }
            SocketEventKind::Error(code) => {
                if debug_enabled {
                    debug!(session_id = %self.id, socket_id = event.socket_id, code = %code, "socket error");
                }
                send_if_open(transport, ServerMessage::error(code));
            }
            SocketEventKind::Close { had_error } => {
                if debug_enabled {
                    debug!(session_id = %self.id, socket_id = event.socket_id, had_error, "socket closed");
                }
                self.socket = None;
                send_if_open(transport, ServerMessage::Close { had_error });
            }
        }
    }

    fn connect(&mut self, overrides: &TcpOptionsOverride) {
        if self.socket.is_some() {
            self.reject(SessionError::AlreadyConnected);
            return;
        }

        let options = self.config.default_tcp_options.merged(overrides);
        let encoding = match options.encoding() {
            Ok(encoding) => encoding,
            Err(err) => {
                self.reply(ServerMessage::error(err.to_string()));
                return;
            }
        };

        if !self.config.policy.authorize(&options.host, options.port) {
            if self.config.debug {
                debug!(session_id = %self.id, host = %options.host, port = options.port, "connection denied");
            }
            self.reject(SessionError::NotAllowed);
            return;
        }

        self.last_socket_id += 1;
        let id = self.last_socket_id;
        if self.config.debug {
            debug!(session_id = %self.id, socket_id = id, host = %options.host, port = options.port, %encoding, "connecting");
        }
        let handle = self.connector.connect(id, &options, self.events.clone());
        self.socket = Some(SocketBinding {
            handle,
            ready: false,
            encoding,
            decoder: encoding.decoder(),
        });
    }

    fn write(&self, payload: Option<Payload>) {
        let Some(binding) = &self.socket else {
            self.reject(SessionError::NotConnected);
            return;
        };
        let Some(payload) = payload else {
            self.reject(SessionError::NoPayload);
            return;
        };

        let bytes = match payload {
            Payload::Text(text) => match binding.encoding.encode(&text) {
                Ok(bytes) => bytes,
                Err(err) => {
                    self.reply(ServerMessage::error(err.to_string()));
                    return;
                }
            },
            Payload::Bytes(bytes) => bytes,
        };
        binding.handle.write(bytes);
    }

    fn end_socket(&self) {
        match &self.socket {
            Some(binding) => binding.handle.end(),
            None => self.reject(SessionError::NotConnected),
        }
    }

    fn reject(&self, err: SessionError) {
        self.reply(ServerMessage::error(err.to_string()));
    }

    // Direct replies to a client message are not gated on transport state.
    fn reply(&self, message: ServerMessage) {
        self.transport.send(message);
    }
}

fn send_if_open(transport: &dyn Transport, message: ServerMessage) {
    if transport.is_open() {
        transport.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;
    use tracing::Level;
    use webtcp_core::{AuthorizationPolicy, TcpOptions};

    use crate::socket::SocketCommand;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<ServerMessage>>,
        closed: AtomicBool,
    }

    impl RecordingTransport {
        fn take(&self) -> Vec<ServerMessage> {
            std::mem::take(&mut *self.sent.lock())
        }

        fn shut(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, message: ServerMessage) {
            self.sent.lock().push(message);
        }

        fn is_open(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct RecordingConnector {
        opened: Mutex<Vec<(SocketId, TcpOptions)>>,
        commands: Mutex<Vec<mpsc::UnboundedReceiver<SocketCommand>>>,
    }

    impl RecordingConnector {
        fn count(&self) -> usize {
            self.opened.lock().len()
        }

        fn last_options(&self) -> TcpOptions {
            self.opened.lock().last().unwrap().1.clone()
        }

        /// Commands received so far by the socket opened `index`-th.
        fn commands(&self, index: usize) -> Vec<SocketCommand> {
            let mut receivers = self.commands.lock();
            let mut out = Vec::new();
            while let Ok(command) = receivers[index].try_recv() {
                out.push(command);
            }
            out
        }
    }

    impl Connector for RecordingConnector {
        fn connect(&self, id: SocketId, options: &TcpOptions, _events: EventSink) -> SocketHandle {
            let (tx, rx) = mpsc::unbounded_channel();
            self.opened.lock().push((id, options.clone()));
            self.commands.lock().push(rx);
            SocketHandle::new(id, tx)
        }
    }

    struct Harness {
        session: Session,
        transport: Arc<RecordingTransport>,
        connector: Arc<RecordingConnector>,
        _events: mpsc::UnboundedReceiver<SocketEvent>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(BridgeConfig::default())
        }

        fn with_policy(policy: impl AuthorizationPolicy + 'static) -> Self {
            Self::with_config(BridgeConfig {
                policy: Arc::new(policy),
                ..BridgeConfig::default()
            })
        }

        fn with_config(config: BridgeConfig) -> Self {
            let transport = Arc::new(RecordingTransport::default());
            let connector = Arc::new(RecordingConnector::default());
            let (tx, rx) = mpsc::unbounded_channel();
            let session = Session::new(transport.clone(), Arc::new(config), connector.clone(), tx);
            Self {
                session,
                transport,
                connector,
                _events: rx,
            }
        }

        fn event(&mut self, socket_id: SocketId, kind: SocketEventKind) {
            self.session.handle_socket_event(SocketEvent { socket_id, kind });
        }

        /// Connect and complete the handshake of socket `id`.
        fn connected(&mut self, id: SocketId) {
            self.session.dispatch(r#"{"type":"connect"}"#);
            self.event(id, SocketEventKind::Ready);
            assert_eq!(self.transport.take(), vec![ServerMessage::Connect]);
        }
    }

    fn error(text: &str) -> ServerMessage {
        ServerMessage::error(text)
    }

    // ── connect ─────────────────────────────────────────────────────

    #[test]
    fn connect_acknowledges_only_after_ready() {
        let mut h = Harness::new();
        assert_eq!(h.session.state(), SessionState::Disconnected);

        h.session.dispatch(r#"{"type":"connect","host":"example.test","port":80}"#);
        assert_eq!(h.session.state(), SessionState::Connecting);
        assert!(h.transport.take().is_empty());
        assert_eq!(h.connector.count(), 1);

        h.event(1, SocketEventKind::Ready);
        assert_eq!(h.session.state(), SessionState::Connected);
        assert_eq!(h.transport.take(), vec![ServerMessage::Connect]);
    }

    #[test]
    fn connect_merges_message_fields_over_defaults() {
        let mut h = Harness::new();
        h.session
            .dispatch(r#"{"type":"connect","host":"example.test","port":80,"noDelay":true}"#);

        let options = h.connector.last_options();
        assert_eq!(options.host, "example.test");
        assert_eq!(options.port, 80);
        assert!(options.no_delay);
        assert_eq!(options.encoding, "utf8");
        assert_eq!(options.timeout_ms, 0);
    }

    #[test]
    fn connect_without_fields_uses_defaults() {
        let mut h = Harness::new();
        h.session.dispatch(r#"{"type":"connect"}"#);
        assert_eq!(h.connector.last_options(), TcpOptions::default());
    }

    #[test]
    fn second_connect_is_rejected_while_connecting_or_connected() {
        let mut h = Harness::new();
        h.session.dispatch(r#"{"type":"connect"}"#);
        h.session.dispatch(r#"{"type":"connect"}"#);
        assert_eq!(h.transport.take(), vec![error("already connected")]);

        h.event(1, SocketEventKind::Ready);
        let _ = h.transport.take();
        h.session.dispatch(r#"{"type":"connect","host":"other.test"}"#);
        assert_eq!(h.transport.take(), vec![error("already connected")]);

        assert_eq!(h.connector.count(), 1);
        assert_eq!(h.session.state(), SessionState::Connected);
    }

    #[test]
    fn denied_connect_creates_no_socket() {
        let mut h = Harness::with_policy(|_: &str, _: u16| false);
        h.session.dispatch(r#"{"type":"connect","host":"example.test","port":80}"#);

        assert_eq!(h.transport.take(), vec![error("not allowed connection")]);
        assert_eq!(h.connector.count(), 0);
        assert_eq!(h.session.state(), SessionState::Disconnected);
    }

    #[test]
    fn policy_sees_resolved_target() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let mut h = Harness::with_policy(move |host: &str, port: u16| {
            record.lock().push((host.to_owned(), port));
            port == 80
        });

        h.session.dispatch(r#"{"type":"connect","host":"example.test"}"#);
        h.session.dispatch(r#"{"type":"connect","host":"example.test","port":80}"#);

        assert_eq!(
            *seen.lock(),
            vec![("example.test".to_owned(), 9998), ("example.test".to_owned(), 80)]
        );
        assert_eq!(h.transport.take(), vec![error("not allowed connection")]);
        assert_eq!(h.connector.count(), 1);
    }

    #[test]
    fn unknown_encoding_is_rejected_before_connecting() {
        let mut h = Harness::new();
        h.session.dispatch(r#"{"type":"connect","encoding":"klingon"}"#);
        assert_eq!(h.transport.take(), vec![error("unknown encoding: klingon")]);
        assert_eq!(h.connector.count(), 0);
    }

    // ── data ────────────────────────────────────────────────────────

    #[test]
    fn data_without_socket_is_not_connected() {
        let mut h = Harness::new();
        h.session.dispatch(r#"{"type":"data","payload":"hello"}"#);
        assert_eq!(h.transport.take(), vec![error("not connected")]);
    }

    #[test]
    fn data_without_payload_is_rejected() {
        let mut h = Harness::new();
        h.connected(1);
        h.session.dispatch(r#"{"type":"data"}"#);
        h.session.dispatch(r#"{"type":"data","payload":null}"#);
        assert_eq!(h.transport.take(), vec![error("no payload"), error("no payload")]);
        assert!(h.connector.commands(0).is_empty());
    }

    #[test]
    fn text_payload_writes_encoded_bytes() {
        let mut h = Harness::new();
        h.connected(1);
        h.session.dispatch(r#"{"type":"data","payload":"hello"}"#);
        assert_eq!(h.connector.commands(0), vec![SocketCommand::Write(b"hello".to_vec())]);
        assert!(h.transport.take().is_empty());
    }

    #[test]
    fn byte_array_payload_is_written_verbatim() {
        let mut h = Harness::new();
        h.connected(1);
        h.session.dispatch(r#"{"type":"data","payload":[0,1,254,255]}"#);
        assert_eq!(h.connector.commands(0), vec![SocketCommand::Write(vec![0, 1, 254, 255])]);
    }

    #[test]
    fn text_payload_uses_session_encoding() {
        let mut h = Harness::new();
        h.session.dispatch(r#"{"type":"connect","encoding":"base64"}"#);
        h.session.dispatch(r#"{"type":"data","payload":"aGk="}"#);
        assert_eq!(h.connector.commands(0), vec![SocketCommand::Write(b"hi".to_vec())]);
    }

    #[test]
    fn invalid_text_for_encoding_is_reported() {
        let mut h = Harness::new();
        h.session.dispatch(r#"{"type":"connect","encoding":"hex"}"#);
        h.session.dispatch(r#"{"type":"data","payload":"xyz"}"#);
        assert_eq!(h.transport.take(), vec![error("payload is not valid hex")]);
        assert!(h.connector.commands(0).is_empty());
    }

    #[test]
    fn data_while_connecting_is_forwarded_to_driver() {
        let mut h = Harness::new();
        h.session.dispatch(r#"{"type":"connect"}"#);
        h.session.dispatch(r#"{"type":"data","payload":"early"}"#);
        assert_eq!(h.connector.commands(0), vec![SocketCommand::Write(b"early".to_vec())]);
        assert!(h.transport.take().is_empty());
    }

    // ── close ───────────────────────────────────────────────────────

    #[test]
    fn close_without_socket_is_not_connected() {
        let mut h = Harness::new();
        h.session.dispatch(r#"{"type":"close"}"#);
        assert_eq!(h.transport.take(), vec![error("not connected")]);
    }

    #[test]
    fn close_ends_socket_and_clears_on_close_event() {
        let mut h = Harness::new();
        h.connected(1);

        h.session.dispatch(r#"{"type":"close"}"#);
        assert_eq!(h.connector.commands(0), vec![SocketCommand::End]);
        assert!(h.session.has_socket());
        assert!(h.transport.take().is_empty());

        h.event(1, SocketEventKind::Close { had_error: false });
        assert_eq!(h.session.state(), SessionState::Disconnected);
        assert_eq!(h.transport.take(), vec![ServerMessage::Close { had_error: false }]);
    }

    #[test]
    fn transport_close_ends_socket_without_reply() {
        let mut h = Harness::new();
        h.session.close();
        assert!(h.transport.take().is_empty());

        h.connected(1);
        h.transport.shut();
        h.session.close();
        assert_eq!(h.connector.commands(0), vec![SocketCommand::End]);
        assert!(h.transport.take().is_empty());
    }

    // ── socket events ───────────────────────────────────────────────

    #[test]
    fn socket_data_is_decoded_across_chunks() {
        let mut h = Harness::new();
        h.connected(1);

        let bytes = "héllo".as_bytes();
        h.event(1, SocketEventKind::Data(bytes[..2].to_vec()));
        h.event(1, SocketEventKind::Data(bytes[2..].to_vec()));

        assert_eq!(
            h.transport.take(),
            vec![
                ServerMessage::Data { payload: "h".into() },
                ServerMessage::Data { payload: "éllo".into() },
            ]
        );
    }

    #[test]
    fn end_flushes_decoder_before_end_message() {
        let mut h = Harness::new();
        h.session.dispatch(r#"{"type":"connect","encoding":"base64"}"#);
        h.event(1, SocketEventKind::Ready);
        h.event(1, SocketEventKind::Data(vec![1, 2, 3, 4]));
        h.event(1, SocketEventKind::End);

        assert_eq!(
            h.transport.take(),
            vec![
                ServerMessage::Connect,
                ServerMessage::Data { payload: "AQID".into() },
                ServerMessage::Data { payload: "BA==".into() },
                ServerMessage::End,
            ]
        );
        assert_eq!(h.session.state(), SessionState::Connected);
    }

    #[test]
    fn socket_error_is_reported_then_close_with_error() {
        let mut h = Harness::new();
        h.session.dispatch(r#"{"type":"connect"}"#);
        h.event(1, SocketEventKind::Error("ECONNREFUSED".into()));
        assert!(h.session.has_socket());
        h.event(1, SocketEventKind::Close { had_error: true });

        assert_eq!(
            h.transport.take(),
            vec![error("ECONNREFUSED"), ServerMessage::Close { had_error: true }]
        );
        assert_eq!(h.session.state(), SessionState::Disconnected);
    }

    #[test]
    fn timeout_destroys_socket_and_is_sent_even_when_closed() {
        let mut h = Harness::new();
        h.connected(1);
        h.transport.shut();

        h.event(1, SocketEventKind::Timeout);
        assert_eq!(h.connector.commands(0), vec![SocketCommand::Destroy]);
        assert_eq!(h.transport.take(), vec![ServerMessage::Timeout]);

        h.event(1, SocketEventKind::Close { had_error: false });
        assert!(h.transport.take().is_empty());
        assert!(!h.session.has_socket());
    }

    #[test]
    fn socket_messages_are_gated_on_open_transport() {
        let mut h = Harness::new();
        h.session.dispatch(r#"{"type":"connect"}"#);
        h.transport.shut();

        h.event(1, SocketEventKind::Ready);
        h.event(1, SocketEventKind::Data(b"x".to_vec()));
        h.event(1, SocketEventKind::End);
        h.event(1, SocketEventKind::Error("ECONNRESET".into()));
        h.event(1, SocketEventKind::Close { had_error: true });

        assert!(h.transport.take().is_empty());
        assert_eq!(h.session.state(), SessionState::Disconnected);
    }

    #[test]
    fn direct_replies_ignore_transport_state() {
        let mut h = Harness::new();
        h.transport.shut();
        h.session.dispatch(r#"{"type":"close"}"#);
        assert_eq!(h.transport.take(), vec![error("not connected")]);
    }

    #[test]
    fn stale_socket_events_are_ignored() {
        let mut h = Harness::new();
        h.connected(1);
        h.event(1, SocketEventKind::Close { had_error: false });
        let _ = h.transport.take();

        h.session.dispatch(r#"{"type":"connect"}"#);
        h.event(1, SocketEventKind::Ready);
        h.event(1, SocketEventKind::Close { had_error: true });
        assert_eq!(h.session.state(), SessionState::Connecting);
        assert!(h.transport.take().is_empty());

        h.event(2, SocketEventKind::Ready);
        assert_eq!(h.session.state(), SessionState::Connected);
    }

    // ── parse errors ────────────────────────────────────────────────

    #[test]
    fn parse_failures_reply_with_description() {
        let mut h = Harness::new();
        h.session.dispatch("not json");
        h.session.dispatch(r#"{"type":"open"}"#);
        h.session.dispatch(r#"{"type":"data","payload":42}"#);

        let sent = h.transport.take();
        assert_eq!(sent.len(), 3);
        assert_matches!(&sent[0], ServerMessage::Error { error } if error.starts_with("invalid JSON"));
        assert_eq!(sent[1], error("unknown message type: open"));
        assert_eq!(
            sent[2],
            error("payload must be a string or an array of byte values")
        );
        assert_eq!(h.session.state(), SessionState::Disconnected);
    }

    // ── scenarios ───────────────────────────────────────────────────

    #[test]
    fn full_lifecycle_then_reconnect() {
        let mut h = Harness::new();
        h.session.dispatch(r#"{"type":"connect","host":"example.test","port":80}"#);
        h.event(1, SocketEventKind::Ready);
        h.session.dispatch(r#"{"type":"data","payload":"GET / \n"}"#);
        assert_eq!(h.connector.commands(0), vec![SocketCommand::Write(b"GET / \n".to_vec())]);

        h.event(1, SocketEventKind::Close { had_error: false });
        assert_eq!(
            h.transport.take(),
            vec![ServerMessage::Connect, ServerMessage::Close { had_error: false }]
        );
        assert_eq!(h.session.state(), SessionState::Disconnected);

        h.session.dispatch(r#"{"type":"connect"}"#);
        assert_eq!(h.connector.count(), 2);
        assert!(h.transport.take().is_empty());
        assert_eq!(h.session.state(), SessionState::Connecting);
    }

    #[test]
    fn at_most_one_socket_after_every_dispatch() {
        let mut h = Harness::new();
        for raw in [
            r#"{"type":"connect"}"#,
            r#"{"type":"connect"}"#,
            r#"{"type":"data","payload":"x"}"#,
            r#"{"type":"connect","port":1}"#,
            r#"{"type":"close"}"#,
            r#"{"type":"connect"}"#,
        ] {
            h.session.dispatch(raw);
            assert!(h.connector.count() <= 1);
        }
    }

    #[test]
    fn sessions_are_independent() {
        let mut a = Harness::new();
        let mut b = Harness::new();
        assert_ne!(a.session.id(), b.session.id());

        a.connected(1);
        b.session.dispatch(r#"{"type":"data","payload":"x"}"#);
        assert_eq!(b.transport.take(), vec![error("not connected")]);
        assert_eq!(a.session.state(), SessionState::Connected);
        assert_eq!(b.session.state(), SessionState::Disconnected);
        assert!(a.transport.take().is_empty());
    }

    #[test]
    fn closing_one_session_leaves_another_connected() {
        let mut a = Harness::new();
        let mut b = Harness::new();
        a.connected(1);
        b.connected(1);

        a.session.dispatch(r#"{"type":"close"}"#);
        assert_eq!(a.connector.commands(0), vec![SocketCommand::End]);
        a.event(1, SocketEventKind::Close { had_error: false });
        assert_eq!(a.transport.take(), vec![ServerMessage::Close { had_error: false }]);
        assert_eq!(a.session.state(), SessionState::Disconnected);

        assert_eq!(b.session.state(), SessionState::Connected);
        assert!(b.session.has_socket());
        assert!(b.transport.take().is_empty());
        assert!(b.connector.commands(0).is_empty());

        b.session.dispatch(r#"{"type":"data","payload":"still here"}"#);
        assert_eq!(b.connector.commands(0), vec![SocketCommand::Write(b"still here".to_vec())]);
    }

    // ── diagnostics ─────────────────────────────────────────────────

    #[test]
    fn debug_flag_gates_diagnostics() {
        let (logs, _guard) = webtcp_logging::capture_logs();

        let mut quiet = Harness::new();
        quiet.session.dispatch(r#"{"type":"connect"}"#);
        assert_eq!(logs.count_at_level(Level::DEBUG), 0);

        let mut chatty = Harness::with_config(BridgeConfig {
            debug: true,
            ..BridgeConfig::default()
        });
        chatty.session.dispatch(r#"{"type":"connect"}"#);
        chatty.event(1, SocketEventKind::Ready);
        assert!(logs.has_event(Level::DEBUG, "got message"));
        assert!(logs.has_event(Level::DEBUG, "socket ready"));
    }
}
