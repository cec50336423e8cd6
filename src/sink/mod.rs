//! Metrics backend abstraction.
//!
//! # Responsibilities
//! - Define the calls the capture pipeline makes against a metrics backend
//! - Carry metric identity (context, name, kind, unit) alongside tag sets
//!
//! # Data Flow
//! ```text
//! GaugeRegistry      → register_gauge (once per key)
//! AggregationEmitter → increment_counter / record_histogram
//! HeartbeatReporter  → PointSender::send_metric
//!     → recorder.rs (metrics facade, Prometheus exporter)
//!     → memory.rs   (in-process inspection)
//! ```
//!
//! # Design Decisions
//! - Sinks must be non-blocking or internally buffered; callers never hold a
//!   shared lock across a sink call
//! - Every call returns a `Result`; callers log failures and move on

pub mod memory;
pub mod recorder;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::gauge::GaugeKey;
use crate::tags::TagSet;

pub use memory::{InMemorySink, Observation};
pub use recorder::RecorderSink;

/// Pull-based value source handed to the sink when a gauge is registered.
pub type GaugeSupplier = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Errors reported by a metrics backend.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("metric {name} rejected: {reason}")]
    Rejected { name: String, reason: String },
}

/// Kind of a reported metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    /// Reports the change since the last flush; used for cross-tier rollups.
    DeltaCounter,
    Histogram,
}

/// Measurement unit attached to a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Requests,
    Responses,
    Errors,
    Milliseconds,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Requests => "requests",
            Unit::Responses => "resp",
            Unit::Errors => "errors",
            Unit::Milliseconds => "ms",
        }
    }
}

/// Identity of a counter or histogram.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricKey {
    pub context: String,
    pub name: String,
    pub kind: MetricKind,
    pub unit: Unit,
}

impl MetricKey {
    pub fn counter(context: &str, name: impl Into<String>, unit: Unit) -> Self {
        Self::new(context, name, MetricKind::Counter, unit)
    }

    pub fn delta_counter(context: &str, name: impl Into<String>, unit: Unit) -> Self {
        Self::new(context, name, MetricKind::DeltaCounter, unit)
    }

    pub fn histogram(context: &str, name: impl Into<String>, unit: Unit) -> Self {
        Self::new(context, name, MetricKind::Histogram, unit)
    }

    fn new(context: &str, name: impl Into<String>, kind: MetricKind, unit: Unit) -> Self {
        Self {
            context: context.to_string(),
            name: name.into(),
            kind,
            unit,
        }
    }

    /// Context-qualified name, e.g. `http.server.response.errors`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.context, self.name)
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.context, self.name)
    }
}

/// Backend receiving gauges, counters and histograms.
pub trait MetricsSink: Send + Sync {
    /// Register a gauge whose value is read from `supplier` at report time.
    fn register_gauge(&self, key: &GaugeKey, supplier: GaugeSupplier) -> Result<(), SinkError>;

    fn increment_counter(&self, key: &MetricKey, tags: &TagSet, amount: u64)
        -> Result<(), SinkError>;

    fn record_histogram(&self, key: &MetricKey, tags: &TagSet, value: f64)
        -> Result<(), SinkError>;
}

/// Sends a single data point directly, bypassing aggregation.
pub trait PointSender: Send + Sync {
    fn send_metric(
        &self,
        name: &str,
        value: f64,
        timestamp_ms: u64,
        source: &str,
        tags: &TagSet,
    ) -> Result<(), SinkError>;
}
