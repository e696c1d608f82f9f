//! Wire protocol between the sandboxed client and the bridge.
//!
//! Every message is one JSON object tagged by its `type` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;
use crate::options::TcpOptionsOverride;

/// Data written by the client: text, or an array of byte values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Encoded with the session encoding before writing.
    Text(String),
    /// Written verbatim.
    Bytes(Vec<u8>),
}

/// Client → bridge message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientMessage {
    /// Open a socket, overriding any default options present.
    Connect(TcpOptionsOverride),
    /// Write to the socket. `None` when the message carried no payload.
    Data(Option<Payload>),
    /// End the socket gracefully.
    Close,
}

impl ClientMessage {
    /// Parse one raw transport message.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(map) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        let kind = map
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?
            .to_owned();

        match kind.as_str() {
            "connect" => serde_json::from_value(Value::Object(map))
                .map(Self::Connect)
                .map_err(ProtocolError::InvalidOptions),
            "data" => match map.get("payload") {
                None | Some(Value::Null) => Ok(Self::Data(None)),
                Some(payload) => serde_json::from_value(payload.clone())
                    .map(|p| Self::Data(Some(p)))
                    .map_err(|_| ProtocolError::InvalidPayload),
            },
            "close" => Ok(Self::Close),
            _ => Err(ProtocolError::UnknownType(kind)),
        }
    }

    /// The `type` tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Data(_) => "data",
            Self::Close => "close",
        }
    }
}

/// Bridge → client message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// The socket finished its handshake.
    Connect,
    /// Data read from the socket.
    Data {
        /// Decoded text.
        payload: String,
    },
    /// The peer half-closed the connection.
    End,
    /// The socket is fully closed.
    Close {
        /// Whether the close was caused by a socket error.
        #[serde(rename = "hadError")]
        had_error: bool,
    },
    /// The idle timeout elapsed.
    Timeout,
    /// A protocol, policy, sequencing, or socket error.
    Error {
        /// Human-readable text or a socket error code.
        error: String,
    },
}

impl ServerMessage {
    /// Build an `error` message.
    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    /// The `type` tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Data { .. } => "data",
            Self::End => "end",
            Self::Close { .. } => "close",
            Self::Timeout => "timeout",
            Self::Error { .. } => "error",
        }
    }

    /// Serialize to the JSON text sent over the transport.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","error":"failed to serialize message: {e}"}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn parse_connect_without_overrides() {
        let msg = ClientMessage::parse(r#"{"type":"connect"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Connect(TcpOptionsOverride::default()));
    }

    #[test]
    fn parse_connect_with_overrides() {
        let msg =
            ClientMessage::parse(r#"{"type":"connect","host":"example.test","port":80}"#).unwrap();
        assert_matches!(msg, ClientMessage::Connect(o) => {
            assert_eq!(o.host.as_deref(), Some("example.test"));
            assert_eq!(o.port, Some(80));
        });
    }

    #[test]
    fn parse_connect_with_bad_option() {
        let err = ClientMessage::parse(r#"{"type":"connect","port":"eighty"}"#).unwrap_err();
        assert_matches!(err, ProtocolError::InvalidOptions(_));
        assert!(err.to_string().starts_with("invalid connect options"));
    }

    #[test]
    fn parse_text_payload() {
        let msg = ClientMessage::parse(r#"{"type":"data","payload":"hello"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Data(Some(Payload::Text("hello".into()))));
    }

    #[test]
    fn parse_byte_payload() {
        let msg = ClientMessage::parse(r#"{"type":"data","payload":[0,127,255]}"#).unwrap();
        assert_eq!(msg, ClientMessage::Data(Some(Payload::Bytes(vec![0, 127, 255]))));
    }

    #[test]
    fn parse_missing_and_null_payload() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"data"}"#).unwrap(),
            ClientMessage::Data(None)
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"data","payload":null}"#).unwrap(),
            ClientMessage::Data(None)
        );
    }

    #[test]
    fn parse_invalid_payloads() {
        for raw in [
            r#"{"type":"data","payload":42}"#,
            r#"{"type":"data","payload":{"a":1}}"#,
            r#"{"type":"data","payload":[256]}"#,
            r#"{"type":"data","payload":[-1]}"#,
        ] {
            assert_matches!(ClientMessage::parse(raw), Err(ProtocolError::InvalidPayload), "{raw}");
        }
    }

    #[test]
    fn parse_close_ignores_extra_fields() {
        let msg = ClientMessage::parse(r#"{"type":"close","reason":"bye"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Close);
    }

    #[test]
    fn parse_failures() {
        assert_matches!(ClientMessage::parse("not json"), Err(ProtocolError::InvalidJson(_)));
        assert_matches!(ClientMessage::parse("[1,2]"), Err(ProtocolError::NotAnObject));
        assert_matches!(ClientMessage::parse("{}"), Err(ProtocolError::MissingType));
        assert_matches!(ClientMessage::parse(r#"{"type":7}"#), Err(ProtocolError::MissingType));
        assert_matches!(
            ClientMessage::parse(r#"{"type":"open"}"#),
            Err(ProtocolError::UnknownType(ref k)) if k == "open"
        );
    }

    #[test]
    fn client_kinds() {
        assert_eq!(ClientMessage::Close.kind(), "close");
        assert_eq!(ClientMessage::Data(None).kind(), "data");
    }

    #[test]
    fn server_messages_serialize_to_wire_shape() {
        assert_eq!(
            serde_json::to_value(ServerMessage::Connect).unwrap(),
            json!({"type": "connect"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Data { payload: "hi".into() }).unwrap(),
            json!({"type": "data", "payload": "hi"})
        );
        assert_eq!(serde_json::to_value(ServerMessage::End).unwrap(), json!({"type": "end"}));
        assert_eq!(
            serde_json::to_value(ServerMessage::Close { had_error: false }).unwrap(),
            json!({"type": "close", "hadError": false})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Timeout).unwrap(),
            json!({"type": "timeout"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::error("not connected")).unwrap(),
            json!({"type": "error", "error": "not connected"})
        );
    }

    #[test]
    fn server_message_to_json_parses_back() {
        let msg = ServerMessage::Close { had_error: true };
        let back: ServerMessage = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.kind(), "close");
    }
}
