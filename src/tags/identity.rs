//! Application identity shared by every request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Who is emitting telemetry: application, service and optional topology.
///
/// Created once at startup and shared read-only behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApplicationIdentity {
    pub application: String,
    pub service: String,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub shard: Option<String>,
    /// Extra tags attached to every reported metric.
    #[serde(default)]
    pub custom_tags: BTreeMap<String, String>,
}

impl ApplicationIdentity {
    pub fn new(application: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            service: service.into(),
            cluster: None,
            shard: None,
            custom_tags: BTreeMap::new(),
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    pub fn with_shard(mut self, shard: impl Into<String>) -> Self {
        self.shard = Some(shard.into());
        self
    }

    pub fn with_custom_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_tags.insert(key.into(), value.into());
        self
    }
}

impl Default for ApplicationIdentity {
    fn default() -> Self {
        Self::new("unknown-application", "unknown-service")
    }
}
