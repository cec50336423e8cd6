//! Adapters between real HTTP stacks and the lifecycle events.
//!
//! # Data Flow
//! ```text
//! Inbound (server.rs, axum):
//!     track_request  → RequestStarted
//!         select_route → ActionSelected (MatchedPath + RouteCatalog)
//!             handler
//!     track_request  → UnhandledException (panic or HandlerFault)
//!                    → RequestCompleted, copy X-Span-Name to response
//!
//! Outbound (client.rs, reqwest):
//!     OutboundStarted → execute → OutboundFailed? → OutboundCompleted
//! ```
//!
//! # Design Decisions
//! - Nothing is built per request when no observer is subscribed
//! - Handler panics are reported, then answered with a plain 500

pub mod catalog;
pub mod client;
pub mod server;

pub use catalog::RouteCatalog;
pub use client::InstrumentedClient;
pub use server::{instrument, select_route, track_request, HandlerFault, HostState};
