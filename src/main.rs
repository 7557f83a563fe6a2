//! scpid - SCPI instrument daemon
//!
//! Serves a configurable SCPI command tree over TCP, with IEEE-488.2
//! status reporting and operation-complete tracking.

mod config;
mod http;
mod instrument;
mod metrics;
mod network;
mod telemetry;

use crate::config::Config;
use crate::instrument::DispatcherActor;
use crate::network::Gateway;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "scpid.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(
        idn = %config.identity.idn(),
        parameters = config.parameters.len(),
        operations = config.operations.len(),
        "Starting scpid"
    );

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    match config.server.metrics_port {
        None | Some(0) => info!("Metrics disabled"),
        Some(port) => {
            let server = http::MetricsServer::bind(port).await.map_err(|e| {
                error!(port, error = %e, "Failed to bind metrics endpoint");
                e
            })?;
            metrics::init();
            info!(addr = %server.local_addr(), "Metrics initialized");
            tokio::spawn(server.run());
        }
    }

    let events = DispatcherActor::spawn(&config)?;

    let gateway = Gateway::bind(config.server.listen, events, config.server.max_line_len).await?;
    gateway.run().await?;

    Ok(())
}
