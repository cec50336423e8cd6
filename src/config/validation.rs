//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, addresses parse)
//! - Reject identity values that would produce empty tags
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TelemetryConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::TelemetryConfig;

/// One failed check, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &TelemetryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let identity = &config.application;
    if identity.application.trim().is_empty() {
        errors.push(ValidationError::new("application.application", "must not be empty"));
    }
    if identity.service.trim().is_empty() {
        errors.push(ValidationError::new("application.service", "must not be empty"));
    }
    for (field, value) in [("application.cluster", &identity.cluster), ("application.shard", &identity.shard)] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            errors.push(ValidationError::new(field, "must be omitted or non-empty"));
        }
    }
    for (key, value) in &identity.custom_tags {
        if key.trim().is_empty() || value.trim().is_empty() {
            errors.push(ValidationError::new(
                "application.custom_tags",
                format!("tag {key:?} has an empty key or value"),
            ));
        }
    }

    if config.reporting.interval_secs == 0 {
        errors.push(ValidationError::new("reporting.interval_secs", "must be greater than 0"));
    }
    if config.reporting.context.trim().is_empty() {
        errors.push(ValidationError::new("reporting.context", "must not be empty"));
    }

    if config.heartbeat.period_secs == 0 {
        errors.push(ValidationError::new("heartbeat.period_secs", "must be greater than 0"));
    }
    if config.heartbeat.component.trim().is_empty() {
        errors.push(ValidationError::new("heartbeat.component", "must not be empty"));
    }

    if config.exporter.enabled
        && config.exporter.push_gateway.is_none()
        && config.exporter.listen_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "exporter.listen_address",
            format!("{:?} is not a socket address", config.exporter.listen_address),
        ));
    }
    if config
        .tracing
        .otlp_endpoint
        .as_deref()
        .is_some_and(|e| !(e.starts_with("http://") || e.starts_with("https://")))
    {
        errors.push(ValidationError::new(
            "tracing.otlp_endpoint",
            "must be an http:// or https:// URL",
        ));
    }
    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("{:?} is not a socket address", config.server.bind_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
