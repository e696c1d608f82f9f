//! Authorization policies deciding which targets a client may connect to.

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

use crate::errors::PolicyError;

/// Decides whether a session may open a socket to `host:port`.
///
/// Called synchronously before every socket is created.
pub trait AuthorizationPolicy: Send + Sync {
    /// `true` to allow the connection.
    fn authorize(&self, host: &str, port: u16) -> bool;
}

impl<F> AuthorizationPolicy for F
where
    F: Fn(&str, u16) -> bool + Send + Sync,
{
    fn authorize(&self, host: &str, port: u16) -> bool {
        self(host, port)
    }
}

/// Allows every target.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl AuthorizationPolicy for AllowAll {
    fn authorize(&self, _host: &str, _port: u16) -> bool {
        true
    }
}

/// One allow-list entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowRule {
    /// Host glob, e.g. `"*.example.com"` or `"10.0.0.*"`. Case-insensitive.
    pub host: String,
    /// Allowed ports; absent means any port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<u16>>,
}

impl AllowRule {
    /// Rule matching `host` on any port.
    pub fn any_port(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ports: None,
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    host: GlobMatcher,
    ports: Option<Vec<u16>>,
}

/// Allows a target when any rule matches it. An empty list allows everything.
#[derive(Debug, Default)]
pub struct AllowList {
    rules: Vec<CompiledRule>,
}

impl AllowList {
    /// Compile the host patterns of `rules`.
    pub fn new(rules: &[AllowRule]) -> Result<Self, PolicyError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let glob = GlobBuilder::new(&rule.host)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| PolicyError::InvalidPattern {
                        pattern: rule.host.clone(),
                        source,
                    })?;
                Ok(CompiledRule {
                    host: glob.compile_matcher(),
                    ports: rule.ports.clone(),
                })
            })
            .collect::<Result<Vec<_>, PolicyError>>()?;
        Ok(Self { rules })
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the list has no rules (and so allows everything).
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl AuthorizationPolicy for AllowList {
    fn authorize(&self, host: &str, port: u16) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        self.rules.iter().any(|rule| {
            rule.host.is_match(host)
                && rule.ports.as_ref().is_none_or(|ports| ports.contains(&port))
        })
    }
}
