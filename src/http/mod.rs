//! Demo HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, TraceLayer)
//!     → host::track_request (start / exception / completion events)
//!     → host::select_route (catalog lookup, action selection)
//!     → handlers.rs (in-memory alert API, relay via InstrumentedClient)
//! ```

pub mod handlers;
pub mod server;

pub use server::{alert_catalog, HttpServer};
