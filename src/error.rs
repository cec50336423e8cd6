//! Error types shared across the telemetry pipeline.
//!
//! Nothing in the capture path is fatal to the host: these errors are logged
//! at the point where they surface and degrade to missing telemetry. Only
//! startup (configuration, exporters, binding) hands an error back to the
//! caller.

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::sink::SinkError;

/// Errors raised while turning lifecycle events into telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The metrics backend rejected or failed to accept an observation.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The Prometheus or span exporter could not be installed.
    #[error("exporter error: {0}")]
    Exporter(String),

    /// A listener could not be bound.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An observer failed while handling a dispatched event.
    #[error("observer {observer} failed on {event}: {reason}")]
    Dispatch {
        observer: String,
        event: &'static str,
        reason: String,
    },
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, TelemetryError>;
