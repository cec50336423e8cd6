//! Request telemetry for HTTP services.
//!
//! Turns inbound request and outbound call lifecycle events into RED metrics
//! (rate, errors, duration), distributed-tracing spans and a periodic
//! component heartbeat.
//!
//! # Architecture Overview
//!
//! ```text
//!   axum router                                  reqwest client
//!   ───────────                                  ──────────────
//!   host::track_request / select_route           host::InstrumentedClient
//!            │                                            │
//!            ▼                                            ▼
//!   events::EventSource("http.server")      events::EventSource("http.client")
//!            │                                            │
//!            └──────────── events::SourceRegistry ────────┘
//!                                 │
//!                    events::EventSubscriptionManager
//!                     │                          │
//!                     ▼                          ▼
//!   observer::RequestLifecycleObserver   observer::OutboundRequestObserver
//!     │        │          │                      │
//!     ▼        ▼          ▼                      ▼
//!   gauge   emitter    tracer ◀──────────────── tracer
//!     │        │          │
//!     │        │          └──▶ OpenTelemetry SDK ──▶ OTLP collector
//!     └────────┴──▶ sink::MetricsSink ──▶ metrics recorder ──▶ Prometheus
//!
//!   heartbeat::HeartbeatReporter ──▶ sink::PointSender
//! ```
//!
//! [`instrumentation::Instrumentation`] wires the pieces together.

// Core model
pub mod clock;
pub mod error;
pub mod naming;
pub mod tags;

// Capture pipeline
pub mod emitter;
pub mod events;
pub mod gauge;
pub mod heartbeat;
pub mod instrumentation;
pub mod observer;
pub mod sink;
pub mod tracer;

// Host adapters
pub mod host;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::TelemetryConfig;
pub use error::{Result, TelemetryError};
pub use instrumentation::{Instrumentation, InstrumentationBuilder};
pub use lifecycle::Shutdown;
pub use tags::ApplicationIdentity;
