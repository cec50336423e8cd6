//! In-flight request gauges.
//!
//! # Responsibilities
//! - Track in-flight request counts keyed by metric identity
//! - Register each gauge with the sink exactly once, on first touch
//! - Pair every increment with exactly one decrement (see [`InflightGuard`])
//!
//! # Design Decisions
//! - Keys are immutable value types with structural equality and hash
//! - Entries are never removed: the identity set only grows
//! - After creation, updates are lock-free atomic add/sub

pub mod registry;

use std::sync::Arc;

use crate::tags::TagSet;

pub use registry::{GaugeRegistry, InflightGuard};

/// Identity of a gauge: (context, name, tag set content).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GaugeKey {
    pub context: Arc<str>,
    pub name: String,
    pub tags: TagSet,
}

impl GaugeKey {
    pub fn new(context: &str, name: impl Into<String>, tags: TagSet) -> Self {
        Self {
            context: Arc::from(context),
            name: name.into(),
            tags,
        }
    }

    /// Context-qualified name, e.g. `http.server.total_requests.inflight`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.context, self.name)
    }
}
