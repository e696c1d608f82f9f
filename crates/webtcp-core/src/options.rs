//! TCP connect options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::encoding::Encoding;
use crate::errors::ProtocolError;

/// Options used to open and tune one outbound TCP socket.
///
/// Durations are milliseconds on the wire. A `timeout` of `0` disables the
/// idle timeout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TcpOptions {
    /// Target host name or address.
    pub host: String,
    /// Target port.
    pub port: u16,
    /// Encoding name for string payloads in both directions.
    pub encoding: String,
    /// Idle timeout in milliseconds.
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    /// Disable Nagle's algorithm.
    pub no_delay: bool,
    /// Enable TCP keep-alive.
    pub keep_alive: bool,
    /// Keep-alive initial delay in milliseconds (`0` keeps the OS default).
    #[serde(rename = "initialDelay", alias = "initialDelayMs")]
    pub initial_delay_ms: u64,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 9998,
            encoding: "utf8".into(),
            timeout_ms: 0,
            no_delay: false,
            keep_alive: false,
            initial_delay_ms: 0,
        }
    }
}

impl TcpOptions {
    /// Return a copy with every field present in `overrides` replaced.
    #[must_use]
    pub fn merged(&self, overrides: &TcpOptionsOverride) -> Self {
        Self {
            host: overrides.host.clone().unwrap_or_else(|| self.host.clone()),
            port: overrides.port.unwrap_or(self.port),
            encoding: overrides
                .encoding
                .clone()
                .unwrap_or_else(|| self.encoding.clone()),
            timeout_ms: overrides.timeout_ms.unwrap_or(self.timeout_ms),
            no_delay: overrides.no_delay.unwrap_or(self.no_delay),
            keep_alive: overrides.keep_alive.unwrap_or(self.keep_alive),
            initial_delay_ms: overrides.initial_delay_ms.unwrap_or(self.initial_delay_ms),
        }
    }

    /// Parse the encoding name.
    pub fn encoding(&self) -> Result<Encoding, ProtocolError> {
        self.encoding.parse()
    }

    /// Idle timeout, or `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Keep-alive initial delay, or `None` for the OS default.
    pub fn keep_alive_delay(&self) -> Option<Duration> {
        (self.initial_delay_ms > 0).then(|| Duration::from_millis(self.initial_delay_ms))
    }
}

/// Fields a `connect` message may override. Absent fields keep the default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpOptionsOverride {
    /// Target host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Target port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Encoding name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Idle timeout in milliseconds.
    #[serde(default, rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Disable Nagle's algorithm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_delay: Option<bool>,
    /// Enable TCP keep-alive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<bool>,
    /// Keep-alive initial delay in milliseconds.
    #[serde(
        default,
        rename = "initialDelay",
        alias = "initialDelayMs",
        skip_serializing_if = "Option::is_none"
    )]
    pub initial_delay_ms: Option<u64>,
}
