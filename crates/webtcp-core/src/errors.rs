//! Error types.
//!
//! The `Display` text of [`ProtocolError`] and [`SessionError`] is exactly
//! what the client receives in an `error` message.

use thiserror::Error;

use crate::encoding::Encoding;

/// A client message could not be parsed or carried an unusable field.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The raw message is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The message is valid JSON but not an object.
    #[error("message must be a JSON object")]
    NotAnObject,
    /// The `type` field is absent or not a string.
    #[error("message has no type")]
    MissingType,
    /// The `type` field names a kind the bridge does not accept.
    #[error("unknown message type: {0}")]
    UnknownType(String),
    /// A `connect` option has the wrong shape.
    #[error("invalid connect options: {0}")]
    InvalidOptions(serde_json::Error),
    /// A `data` payload is neither a string nor an array of byte values.
    #[error("payload must be a string or an array of byte values")]
    InvalidPayload,
    /// A string payload is not valid text for the session encoding.
    #[error("payload is not valid {0}")]
    InvalidPayloadEncoding(Encoding),
    /// The requested encoding name is not supported.
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),
}

/// A well-formed request that the session refuses in its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The authorization policy rejected the target.
    #[error("not allowed connection")]
    NotAllowed,
    /// A socket already exists for this session.
    #[error("already connected")]
    AlreadyConnected,
    /// The operation needs a socket and there is none.
    #[error("not connected")]
    NotConnected,
    /// A `data` message without a payload.
    #[error("no payload")]
    NoPayload,
}

/// An allow-list rule could not be compiled.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The host pattern is not a valid glob.
    #[error("invalid host pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Underlying glob error.
        #[source]
        source: globset::Error,
    },
}
