//! Settings types.

use serde::{Deserialize, Serialize};
use webtcp_core::{AllowList, AllowRule, Encoding, TcpOptions};
use webtcp_logging::LogFormat;

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebTcpSettings {
    /// WebSocket server settings.
    pub server: ServerSettings,
    /// Bridge defaults and policy.
    pub bridge: BridgeSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl WebTcpSettings {
    /// Check values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<()> {
        if !self.server.path.starts_with('/') {
            return Err(SettingsError::InvalidValue(format!(
                "server.path must start with '/': {:?}",
                self.server.path
            )));
        }
        if matches!(self.server.path.as_str(), "/health" | "/metrics") {
            return Err(SettingsError::InvalidValue(format!(
                "server.path {:?} is reserved",
                self.server.path
            )));
        }
        if self.server.max_connections == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxConnections must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_timeout_secs < self.server.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatTimeoutSecs must not be shorter than the interval".into(),
            ));
        }
        let _: Encoding = self
            .bridge
            .default_tcp_options
            .encoding()
            .map_err(|e| SettingsError::InvalidValue(format!("bridge.defaultTcpOptions: {e}")))?;
        let _ = self.bridge.allow_list()?;
        Ok(())
    }
}

/// WebSocket server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` to auto-assign).
    pub port: u16,
    /// HTTP path that accepts WebSocket upgrades.
    pub path: String,
    /// Maximum concurrent WebSocket clients.
    pub max_connections: usize,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Disconnect a client silent for this many seconds.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9999,
            path: "/".into(),
            max_connections: 256,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}

/// Bridge defaults and connection policy.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// Emit per-session diagnostics.
    pub debug: bool,
    /// Options used when a `connect` message leaves a field out.
    pub default_tcp_options: TcpOptions,
    /// Allowed targets. Empty allows everything.
    pub allow: Vec<AllowRule>,
}

impl BridgeSettings {
    /// Compile [`Self::allow`] into a policy.
    pub fn allow_list(&self) -> Result<AllowList> {
        Ok(AllowList::new(&self.allow)?)
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Compact,
        }
    }
}
