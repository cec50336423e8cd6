//! Prometheus exporter installation.
//!
//! # Responsibilities
//! - Install the global `metrics` recorder
//! - Expose a scrape endpoint, or push to a gateway every reporting interval
//!
//! # Design Decisions
//! - Latency histograms get millisecond buckets
//! - A push gateway, when configured, replaces the scrape listener

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

use crate::config::ExporterConfig;
use crate::error::{Result, TelemetryError};

/// Bucket bounds for `*.latency` histograms, in milliseconds.
pub const LATENCY_BUCKETS_MS: &[f64] = &[
    5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
];

/// Install the exporter. Must run inside a Tokio runtime.
pub fn install(config: &ExporterConfig, interval: Duration) -> Result<()> {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("latency".to_string()), LATENCY_BUCKETS_MS)
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

    let builder = match &config.push_gateway {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, interval_secs = interval.as_secs(), "Pushing metrics to gateway");
            builder
                .with_push_gateway(endpoint, interval, None, None)
                .map_err(|e| TelemetryError::Exporter(e.to_string()))?
        }
        None => {
            let addr: SocketAddr = config
                .listen_address
                .parse()
                .map_err(|e: std::net::AddrParseError| TelemetryError::Exporter(e.to_string()))?;
            tracing::info!(address = %addr, "Prometheus metrics exporter started");
            builder.with_http_listener(addr)
        }
    };

    builder
        .install()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))
}
