//! Process lifecycle for the telemetry daemon.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → gauge publisher flushes and exits
//!              → demo server stops accepting and drains
//!              → instrumentation stops, heartbeat aborts
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop traffic, then detach observers, then stop timers
//! - Triggering twice is harmless

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
