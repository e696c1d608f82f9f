//! Shared, read-only bridge configuration.

use std::fmt;
use std::sync::Arc;

use webtcp_core::{AllowAll, AuthorizationPolicy, TcpOptions, TcpOptionsOverride};

/// Configuration shared by every session of one bridge.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Emit per-session diagnostic events.
    pub debug: bool,
    /// Decides which targets a session may connect to.
    pub policy: Arc<dyn AuthorizationPolicy>,
    /// Options used for fields a `connect` message leaves out.
    pub default_tcp_options: TcpOptions,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            debug: false,
            policy: Arc::new(AllowAll),
            default_tcp_options: TcpOptions::default(),
        }
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("debug", &self.debug)
            .field("default_tcp_options", &self.default_tcp_options)
            .finish_non_exhaustive()
    }
}

impl BridgeConfig {
    /// Apply caller overrides. Scalars replace; TCP options merge per field.
    #[must_use]
    pub fn with_options(mut self, options: BridgeOptions) -> Self {
        if let Some(debug) = options.debug {
            self.debug = debug;
        }
        if let Some(policy) = options.policy {
            self.policy = policy;
        }
        self.default_tcp_options = self.default_tcp_options.merged(&options.default_tcp_options);
        self
    }
}

/// Partial configuration supplied when building a bridge.
#[derive(Clone, Default)]
pub struct BridgeOptions {
    /// Replaces the debug flag.
    pub debug: Option<bool>,
    /// Replaces the authorization policy.
    pub policy: Option<Arc<dyn AuthorizationPolicy>>,
    /// Merged field by field over the default TCP options.
    pub default_tcp_options: TcpOptionsOverride,
}

impl fmt::Debug for BridgeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeOptions")
            .field("debug", &self.debug)
            .field("policy", &self.policy.as_ref().map(|_| ".."))
            .field("default_tcp_options", &self.default_tcp_options)
            .finish()
    }
}
