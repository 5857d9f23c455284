//! Tracing and metrics initialization.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber with the given filter
/// directives, overridable through `RUST_LOG`.
pub fn init_tracing(directives: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives))
        .context("invalid log filter directives")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {e}"))?;
    Ok(())
}

/// Installs the prometheus exporter and its scrape endpoint, and registers
/// the metric descriptions of every subsystem.
pub fn init_metrics(addr: SocketAddr) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install prometheus exporter")?;

    kanvas_service::Metrics::init();
    Ok(())
}
