//! Prometheus metrics helpers for Potiron.
//!
//! # Usage
//!
//! ```rust,ignore
//! use potiron_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     if let Some(handle) = init_metrics() {
//!         start_metrics_server(9091, handle).await.unwrap();
//!     }
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! Every metric starts with `potiron_` and counters end in `_total`.

use axum::{Router, routing::get};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// Returns `None` if a recorder is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_metrics();
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed");
            None
        }
    }
}

/// Start the Prometheus metrics HTTP server.
///
/// Binds `/metrics` on `port` and serves it from a background task.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });

    Ok(())
}

/// Register descriptions for the metrics recorded by this crate.
fn register_metrics() {
    describe_counter!(
        "potiron_keys_merged_total",
        "Day keys merged into a score mapping"
    );
    describe_counter!(
        "potiron_keys_missing_total",
        "Day keys skipped because they hold no data"
    );
    describe_counter!(
        "potiron_records_exported_total",
        "Ranked records produced by exports"
    );
    describe_counter!(
        "potiron_topk_queries_total",
        "Top-K dashboard queries served"
    );
}
