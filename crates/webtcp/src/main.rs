//! # webtcp
//!
//! Bridge server binary: loads settings, starts logging and metrics, then
//! serves WebSocket clients until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use webtcp_bridge::BridgeConfig;
use webtcp_logging::LogFormat;
use webtcp_server::metrics::install_recorder;
use webtcp_server::{ServerConfig, WebTcpServer};
use webtcp_settings::WebTcpSettings;

/// WebSocket to TCP bridge server.
#[derive(Parser, Debug)]
#[command(name = "webtcp", about = "WebSocket to TCP bridge server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// WebSocket upgrade path (overrides settings).
    #[arg(long)]
    path: Option<String>,

    /// Settings file. Defaults to `~/.webtcp/settings.json`.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Maximum concurrent WebSocket clients (overrides settings).
    #[arg(long)]
    max_connections: Option<usize>,

    /// Log per-session diagnostics.
    #[arg(long)]
    debug: bool,

    /// Log filter directive when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Load the settings file and layer the flags on top.
    fn resolve_settings(&self) -> Result<WebTcpSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(webtcp_settings::settings_path);
        let mut settings = webtcp_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref path) = self.path {
            settings.server.path.clone_from(path);
        }
        if let Some(max) = self.max_connections {
            settings.server.max_connections = max;
        }
        if self.debug {
            settings.bridge.debug = true;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.format = LogFormat::Json;
        }

        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

fn bridge_config(settings: &WebTcpSettings) -> Result<BridgeConfig> {
    let policy = settings
        .bridge
        .allow_list()
        .context("Invalid allow list")?;
    Ok(BridgeConfig {
        debug: settings.bridge.debug,
        policy: Arc::new(policy),
        default_tcp_options: settings.bridge.default_tcp_options.clone(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.resolve_settings()?;

    webtcp_logging::init_subscriber(&settings.logging.level, settings.logging.format);
    let metrics = install_recorder().context("Failed to install metrics recorder")?;

    let bridge = bridge_config(&settings)?;
    if settings.bridge.allow.is_empty() {
        tracing::warn!("no allow rules configured, clients may connect to any target");
    } else {
        tracing::info!(rules = settings.bridge.allow.len(), "allow list loaded");
    }

    let server = WebTcpServer::new(ServerConfig::from(&settings.server), bridge, metrics);
    let addr = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        "webtcp listening on ws://{addr}{} (max {} clients)",
        server.config().path,
        server.config().max_connections
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
