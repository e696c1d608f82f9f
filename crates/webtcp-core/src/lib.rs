//! # webtcp-core
//!
//! Shared vocabulary for the webtcp bridge.
//!
//! - **Protocol**: [`ClientMessage`] / [`ServerMessage`], the JSON messages
//!   exchanged with the sandboxed client
//! - **Options**: [`TcpOptions`] and the per-`connect` [`TcpOptionsOverride`]
//! - **Encodings**: [`Encoding`] and the streaming [`StreamDecoder`] used for
//!   socket data
//! - **Collaborators**: the [`Transport`] and [`AuthorizationPolicy`] traits the
//!   session consumes
//! - **Errors**: [`ProtocolError`], [`SessionError`], [`PolicyError`]

#![deny(unsafe_code)]

pub mod encoding;
pub mod errors;
pub mod options;
pub mod policy;
pub mod protocol;
pub mod transport;

pub use encoding::{Encoding, StreamDecoder};
pub use errors::{PolicyError, ProtocolError, SessionError};
pub use options::{TcpOptions, TcpOptionsOverride};
pub use policy::{AllowAll, AllowList, AllowRule, AuthorizationPolicy};
pub use protocol::{ClientMessage, Payload, ServerMessage};
pub use transport::{Transport, TransportEvent};
