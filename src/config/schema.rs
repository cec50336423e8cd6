//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for request
//! telemetry. All types derive Serde traits for deserialization from config
//! files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tags::ApplicationIdentity;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Application, service and optional cluster/shard.
    pub application: ApplicationIdentity,

    /// Metric context, source label and reporting cadence.
    pub reporting: ReportingConfig,

    /// Component heartbeat schedule.
    pub heartbeat: HeartbeatConfig,

    /// Span creation toggle.
    pub tracing: TracingConfig,

    /// Prometheus exporter settings.
    pub exporter: ExporterConfig,

    /// Demo server settings.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Reporting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// How often gauges are published (and pushed, with a push gateway).
    pub interval_secs: u64,

    /// Host label placed on per-source metrics. Empty means the host name.
    pub source: String,

    /// Prefix under which every request metric is reported.
    pub context: String,
}

impl ReportingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Configured source, else `$HOSTNAME`, else `localhost`.
    pub fn resolved_source(&self) -> String {
        if !self.source.trim().is_empty() {
            return self.source.clone();
        }
        std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            source: String::new(),
            context: "http.server".to_string(),
        }
    }
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub enabled: bool,

    /// Delay before the first heartbeat.
    pub warmup_secs: u64,

    /// Delay between heartbeats.
    pub period_secs: u64,

    /// Value of the `component` tag.
    pub component: String,
}

impl HeartbeatConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warmup_secs: 60,
            period_secs: 300,
            component: "http-server".to_string(),
        }
    }
}

/// Tracing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Create server/client spans. Disabled means a no-op tracer.
    pub enabled: bool,

    /// OTLP gRPC collector (e.g., "http://localhost:4317"). Without one,
    /// spans still propagate context but are not exported.
    pub otlp_endpoint: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: None,
        }
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Install the Prometheus exporter at all.
    pub enabled: bool,

    /// Scrape endpoint bind address.
    pub listen_address: String,

    /// Push gateway endpoint. Takes precedence over the listener when set.
    pub push_gateway: Option<String>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_address: "0.0.0.0:9090".to_string(),
            push_gateway: None,
        }
    }
}

/// Demo server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Base URL the relay route forwards to through the instrumented client.
    pub upstream: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            upstream: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
