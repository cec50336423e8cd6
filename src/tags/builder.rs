//! Tag set construction for the five aggregation tiers.

use std::sync::Arc;

use super::{
    ApplicationIdentity, TagSet, Tier, ACTION_TAG_KEY, AGGREGATED_SOURCE, CLUSTER_TAG_KEY,
    CONTROLLER_TAG_KEY, NULL_TAG_VALUE, SERVICE_TAG_KEY, SHARD_TAG_KEY, SOURCE_TAG_KEY,
};

/// The five tier tag sets for one route (or for the overall rollups).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTags {
    source: TagSet,
    shard: TagSet,
    service: TagSet,
    cluster: TagSet,
    application: TagSet,
}

impl TierTags {
    pub fn get(&self, tier: Tier) -> &TagSet {
        match tier {
            Tier::Source => &self.source,
            Tier::Shard => &self.shard,
            Tier::Service => &self.service,
            Tier::Cluster => &self.cluster,
            Tier::Application => &self.application,
        }
    }

    /// The complete (per-source) tag set.
    pub fn full(&self) -> &TagSet {
        &self.source
    }
}

/// Builds tier tag sets from the application identity.
#[derive(Debug, Clone)]
pub struct TagSetBuilder {
    identity: Arc<ApplicationIdentity>,
    source: String,
}

impl TagSetBuilder {
    /// `source` is the host label placed on the per-source tier.
    pub fn new(identity: Arc<ApplicationIdentity>, source: impl Into<String>) -> Self {
        Self {
            identity,
            source: source.into(),
        }
    }

    pub fn identity(&self) -> &ApplicationIdentity {
        &self.identity
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Tag set for a single tier.
    pub fn tags(&self, tier: Tier, controller: Option<&str>, action: Option<&str>) -> TagSet {
        let rule = tier.rule();
        let mut tags = TagSet::new();

        if rule.include_cluster {
            tags.insert(
                CLUSTER_TAG_KEY,
                self.identity.cluster.as_deref().unwrap_or(NULL_TAG_VALUE),
            );
        }
        if rule.include_service {
            tags.insert(SERVICE_TAG_KEY, self.identity.service.as_str());
        }
        if rule.include_shard {
            tags.insert(
                SHARD_TAG_KEY,
                self.identity.shard.as_deref().unwrap_or(NULL_TAG_VALUE),
            );
        }
        if let Some(controller) = controller {
            tags.insert(CONTROLLER_TAG_KEY, controller);
        }
        if let Some(action) = action {
            tags.insert(ACTION_TAG_KEY, action);
        }

        let source = if rule.aggregated_source {
            AGGREGATED_SOURCE
        } else {
            self.source.as_str()
        };
        tags.insert(SOURCE_TAG_KEY, source);
        tags
    }

    /// All five tiers for a route.
    pub fn tier_tags(&self, controller: Option<&str>, action: Option<&str>) -> TierTags {
        TierTags {
            source: self.tags(Tier::Source, controller, action),
            shard: self.tags(Tier::Shard, controller, action),
            service: self.tags(Tier::Service, controller, action),
            cluster: self.tags(Tier::Cluster, controller, action),
            application: self.tags(Tier::Application, controller, action),
        }
    }

    /// Tiers for the overall (route-independent) rollups.
    pub fn overall(&self) -> TierTags {
        self.tier_tags(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(identity: ApplicationIdentity) -> TagSetBuilder {
        TagSetBuilder::new(Arc::new(identity), "host-1")
    }

    #[test]
    fn test_absent_dimensions_render_sentinel() {
        let b = builder(ApplicationIdentity::new("shop", "cart"));
        let full = b.tags(Tier::Source, None, None);
        assert_eq!(full.get(CLUSTER_TAG_KEY), Some(NULL_TAG_VALUE));
        assert_eq!(full.get(SHARD_TAG_KEY), Some(NULL_TAG_VALUE));
        assert_eq!(full.get(SERVICE_TAG_KEY), Some("cart"));
        assert_eq!(full.get(SOURCE_TAG_KEY), Some("host-1"));
    }

    #[test]
    fn test_rule_table() {
        let b = builder(
            ApplicationIdentity::new("shop", "cart")
                .with_cluster("us-west")
                .with_shard("primary"),
        );
        let tiers = b.tier_tags(Some("CartController"), Some("get"));

        let shard = tiers.get(Tier::Shard);
        assert_eq!(shard.get(SHARD_TAG_KEY), Some("primary"));
        assert_eq!(shard.get(SOURCE_TAG_KEY), Some(AGGREGATED_SOURCE));

        let service = tiers.get(Tier::Service);
        assert!(!service.contains_key(SHARD_TAG_KEY));
        assert_eq!(service.get(CLUSTER_TAG_KEY), Some("us-west"));

        let cluster = tiers.get(Tier::Cluster);
        assert!(!cluster.contains_key(SERVICE_TAG_KEY));
        assert_eq!(cluster.get(CLUSTER_TAG_KEY), Some("us-west"));

        let app = tiers.get(Tier::Application);
        assert!(!app.contains_key(CLUSTER_TAG_KEY));
        assert!(!app.contains_key(SERVICE_TAG_KEY));
        assert!(!app.contains_key(SHARD_TAG_KEY));

        for tier in Tier::ALL {
            let tags = tiers.get(tier);
            assert_eq!(tags.get(CONTROLLER_TAG_KEY), Some("CartController"));
            assert_eq!(tags.get(ACTION_TAG_KEY), Some("get"));
        }
    }

    #[test]
    fn test_overall_has_no_route_tags() {
        let b = builder(ApplicationIdentity::new("shop", "cart"));
        let overall = b.overall();
        for tier in Tier::ALL {
            assert!(!overall.get(tier).contains_key(CONTROLLER_TAG_KEY));
            assert!(overall.get(tier).iter().all(|(_, v)| !v.is_empty()));
        }
    }
}
