//! Sink backed by the `metrics` facade.
//!
//! Whatever recorder is installed (the Prometheus exporter in the binary)
//! receives the observations. Gauges are pull-based in the pipeline but
//! push-based in the facade, so registered suppliers are kept here and
//! pushed by [`RecorderSink::publish_gauges`] on every reporting tick.

use dashmap::DashMap;
use metrics::Label;

use super::{GaugeSupplier, MetricKind, MetricKey, MetricsSink, PointSender, SinkError};
use crate::gauge::GaugeKey;
use crate::tags::{ApplicationIdentity, TagSet, APPLICATION_TAG_KEY};

const KIND_LABEL: &str = "metric_kind";

pub struct RecorderSink {
    global_tags: TagSet,
    gauges: DashMap<GaugeKey, GaugeSupplier>,
}

impl RecorderSink {
    /// Global tags are the application name plus the identity's custom tags.
    pub fn new(identity: &ApplicationIdentity) -> Self {
        let mut global_tags = TagSet::new().with(APPLICATION_TAG_KEY, identity.application.as_str());
        for (k, v) in &identity.custom_tags {
            if !global_tags.contains_key(k) {
                global_tags.insert(k.as_str(), v.as_str());
            }
        }
        Self {
            global_tags,
            gauges: DashMap::new(),
        }
    }

    /// Push the current value of every registered gauge to the recorder.
    pub fn publish_gauges(&self) {
        for entry in self.gauges.iter() {
            let key = entry.key();
            let value = (entry.value())();
            metrics::gauge!(key.full_name(), self.labels(&key.tags)).set(value);
        }
    }

    pub fn registered_gauges(&self) -> usize {
        self.gauges.len()
    }

    /// Metric tags first, then global tags that do not collide.
    fn labels(&self, tags: &TagSet) -> Vec<Label> {
        let mut labels: Vec<Label> = tags
            .iter()
            .map(|(k, v)| Label::new(k.to_string(), v.to_string()))
            .collect();
        for (k, v) in self.global_tags.iter() {
            if !tags.contains_key(k) {
                labels.push(Label::new(k.to_string(), v.to_string()));
            }
        }
        labels
    }
}

impl MetricsSink for RecorderSink {
    fn register_gauge(&self, key: &GaugeKey, supplier: GaugeSupplier) -> Result<(), SinkError> {
        self.gauges.insert(key.clone(), supplier);
        Ok(())
    }

    fn increment_counter(
        &self,
        key: &MetricKey,
        tags: &TagSet,
        amount: u64,
    ) -> Result<(), SinkError> {
        let mut labels = self.labels(tags);
        if key.kind == MetricKind::DeltaCounter {
            labels.push(Label::new(KIND_LABEL, "delta"));
        }
        metrics::counter!(key.full_name(), labels).increment(amount);
        Ok(())
    }

    fn record_histogram(
        &self,
        key: &MetricKey,
        tags: &TagSet,
        value: f64,
    ) -> Result<(), SinkError> {
        metrics::histogram!(key.full_name(), self.labels(tags)).record(value);
        Ok(())
    }
}

impl PointSender for RecorderSink {
    fn send_metric(
        &self,
        name: &str,
        value: f64,
        _timestamp_ms: u64,
        source: &str,
        tags: &TagSet,
    ) -> Result<(), SinkError> {
        let tags = tags.clone().with(crate::tags::SOURCE_TAG_KEY, source);
        metrics::gauge!(name.to_string(), self.labels(&tags)).set(value);
        Ok(())
    }
}
