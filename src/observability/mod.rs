//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request telemetry produces:
//!     → sink::RecorderSink (metrics facade)
//!         → exporter.rs (Prometheus scrape endpoint or push gateway)
//!         → publisher.rs (supplier gauges pushed each reporting interval)
//!
//! Server and client spans go through:
//!     → spans.rs (OpenTelemetry SDK provider, OTLP batch export)
//!
//! The crate itself logs through:
//!     → logging.rs (tracing subscriber, env filter)
//! ```
//!
//! # Design Decisions
//! - Structured logging with request ids on request paths
//! - Exporter installation is the binary's choice; the library only records

pub mod exporter;
pub mod logging;
pub mod publisher;
pub mod spans;

pub use publisher::GaugePublisher;
pub use spans::SpanPipeline;
