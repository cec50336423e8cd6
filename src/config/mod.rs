//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TelemetryConfig (validated, immutable)
//!     → passed explicitly to Instrumentation and the binary
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, parse_config, ConfigError};
pub use schema::{
    ExporterConfig, HeartbeatConfig, ObservabilityConfig, ReportingConfig, ServerConfig,
    TelemetryConfig, TracingConfig,
};
pub use validation::ValidationError;
