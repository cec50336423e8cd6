//! Tag sets and aggregation tiers.
//!
//! # Data Flow
//! ```text
//! ApplicationIdentity + source label (startup)
//!     → TagSetBuilder (one rule table, five tiers)
//!     → TierTags per route (controller/action added to every tier)
//!     → AggregationEmitter / GaugeRegistry
//! ```
//!
//! # Design Decisions
//! - Unset cluster/shard render as the `none` sentinel so cardinality is stable
//! - Rollup tiers carry a fixed `source` sentinel instead of the real host

pub mod builder;
pub mod identity;

use std::collections::BTreeMap;
use std::fmt;

pub use builder::{TagSetBuilder, TierTags};
pub use identity::ApplicationIdentity;

pub const APPLICATION_TAG_KEY: &str = "application";
pub const CLUSTER_TAG_KEY: &str = "cluster";
pub const SERVICE_TAG_KEY: &str = "service";
pub const SHARD_TAG_KEY: &str = "shard";
pub const SOURCE_TAG_KEY: &str = "source";
pub const COMPONENT_TAG_KEY: &str = "component";
pub const CONTROLLER_TAG_KEY: &str = "http.server.resource.controller";
pub const ACTION_TAG_KEY: &str = "http.server.resource.action";

/// Placeholder for an unset optional identity dimension.
pub const NULL_TAG_VALUE: &str = "none";

/// `source` value used on every rollup tier.
pub const AGGREGATED_SOURCE: &str = "aggregated";

/// Ordered tag key → value mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Aggregation granularity, finest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Source,
    Shard,
    Service,
    Cluster,
    Application,
}

/// Which identity dimensions a tier carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TierRule {
    pub include_cluster: bool,
    pub include_service: bool,
    pub include_shard: bool,
    pub aggregated_source: bool,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Source,
        Tier::Shard,
        Tier::Service,
        Tier::Cluster,
        Tier::Application,
    ];

    pub(crate) fn rule(self) -> TierRule {
        let (include_cluster, include_service, include_shard, aggregated_source) = match self {
            Tier::Source => (true, true, true, false),
            Tier::Shard => (true, true, true, true),
            Tier::Service => (true, true, false, true),
            Tier::Cluster => (true, false, false, true),
            Tier::Application => (false, false, false, true),
        };
        TierRule {
            include_cluster,
            include_service,
            include_shard,
            aggregated_source,
        }
    }

    /// Suffix used by the rollup metric for this tier.
    pub fn metric_suffix(self) -> &'static str {
        match self {
            Tier::Source => "aggregated_per_source",
            Tier::Shard => "aggregated_per_shard",
            Tier::Service => "aggregated_per_service",
            Tier::Cluster => "aggregated_per_cluster",
            Tier::Application => "aggregated_per_application",
        }
    }

    /// Whether a rollup at this tier is meaningful for the given identity.
    ///
    /// Shard and cluster rollups only exist when the dimension is configured.
    pub fn applies_to(self, identity: &ApplicationIdentity) -> bool {
        match self {
            Tier::Shard => identity.shard.is_some(),
            Tier::Cluster => identity.cluster.is_some(),
            Tier::Source | Tier::Service | Tier::Application => true,
        }
    }
}
