//! Lifecycle event plumbing between the HTTP host and the observers.
//!
//! # Responsibilities
//! - Name event sources and announce them to interested parties
//! - Carry typed lifecycle payloads from the host to observers
//! - Attach observers to matching sources and detach them on shutdown
//!
//! # Data Flow
//! ```text
//! host adapter → EventSource::emit(event)
//!     → subscribers (ArcSwap snapshot, no lock)
//!         → Observer::on_event
//!
//! SourceRegistry::register_source → watchers → EventSubscriptionManager
//!     → EventSource::subscribe (one Subscription per matching observer)
//! ```
//!
//! # Design Decisions
//! - Observers are chosen by a source-name predicate, not by type
//! - The dispatch boundary contains observer errors and panics
//! - Subscriptions are RAII handles; dropping one detaches the observer

pub mod manager;
pub mod payload;
pub mod source;

pub use manager::EventSubscriptionManager;
pub use payload::{Fault, LifecycleEvent, RouteDescriptor, TaskOutcome};
pub use source::{EventSource, SourceRegistry, Subscription, WatchId};

use crate::error::Result;

/// Source name for inbound request events.
pub const SERVER_SOURCE: &str = "http.server";

/// Source name for outbound request events.
pub const CLIENT_SOURCE: &str = "http.client";

/// Receives lifecycle events from the sources it accepts.
pub trait Observer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this observer wants events from the named source.
    fn accepts(&self, source_name: &str) -> bool;

    fn on_event(&self, event: &LifecycleEvent) -> Result<()>;
}
