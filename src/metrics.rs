//! Escrow coordinator metrics.

use metrics::{Counter, Histogram};
use metrics_derive::Metrics;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{net::SocketAddr, time::Duration};
use tracing::info;

/// Starts a Prometheus exporter serving on the given address, returning a
/// handle.
///
/// # Panics
///
/// This will panic if the Prometheus recorder could not be set as the global
/// metrics recorder.
pub fn setup_exporter(metrics_addr: impl Into<SocketAddr>) -> PrometheusHandle {
    let addr: SocketAddr = metrics_addr.into();
    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .upkeep_timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build metrics recorder");

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder).expect("could not set metrics recorder");
    tokio::spawn(exporter);

    info!(%addr, "Started metrics server");

    handle
}

/// Metrics for the escrow lifecycle.
#[derive(Metrics)]
#[metrics(scope = "escrow")]
pub struct EscrowMetrics {
    /// Number of escrows created.
    pub created: Counter,
    /// Number of escrows that crossed the funding threshold.
    pub funded: Counter,
    /// Number of confirmed releases.
    pub released: Counter,
    /// Number of failed release attempts.
    pub release_failures: Counter,
    /// Number of settlement proposals created.
    pub proposals: Counter,
    /// Number of settlement proposals accepted.
    pub proposals_accepted: Counter,
    /// Number of settlement proposals rejected.
    pub proposals_rejected: Counter,
    /// Time from release submission to confirmation, in milliseconds.
    pub release_confirmation_time: Histogram,
}

/// Metrics for the chain gateway.
#[derive(Metrics)]
#[metrics(scope = "gateway")]
pub struct GatewayMetrics {
    /// Number of times a call advanced past a failed endpoint.
    pub failovers: Counter,
    /// Number of confirmed transactions.
    pub confirmations: Counter,
}
