//! Lifecycle observers.
//!
//! # Responsibilities
//! - Track each inbound request from start to completion (server.rs)
//! - Trace outbound calls and propagate trace context (client.rs)
//! - Hold per-request state between events (context.rs)
//!
//! # Data Flow
//! ```text
//! RequestStarted   → start timestamp, server span
//! ActionSelected   → metric name, X-Span-Name, in-flight gauges
//! Exception        → fault recorded, logged on span
//! RequestCompleted → gauges released, span finished, AggregationEmitter
//! ```
//!
//! # Design Decisions
//! - One observer type serves traced and untraced setups; a no-op tracer
//!   turns the span paths off
//! - Completion is exactly-once per request through the finalize flag
//! - Sink and tracer calls happen with the request context unlocked

pub mod client;
pub mod context;
pub mod server;

pub use client::{OutboundRequestObserver, IGNORE_HEADER};
pub use context::{OutboundScope, RequestContext, RequestScope, ResolvedRoute};
pub use server::{RequestLifecycleObserver, SPAN_NAME_HEADER};
