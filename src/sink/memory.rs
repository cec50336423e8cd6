//! In-memory sink that records every call for inspection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

use super::{GaugeSupplier, MetricKey, MetricsSink, PointSender, SinkError};
use crate::gauge::GaugeKey;
use crate::tags::TagSet;

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    GaugeRegistered {
        key: GaugeKey,
    },
    Counter {
        key: MetricKey,
        tags: TagSet,
        amount: u64,
    },
    Histogram {
        key: MetricKey,
        tags: TagSet,
        value: f64,
    },
    Point {
        name: String,
        value: f64,
        timestamp_ms: u64,
        source: String,
        tags: TagSet,
    },
}

#[derive(Default)]
pub struct InMemorySink {
    observations: Mutex<Vec<Observation>>,
    gauges: DashMap<GaugeKey, GaugeSupplier>,
    failing: AtomicBool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with a transport error and records nothing.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Names of counters in emission order, context-qualified.
    pub fn counter_names(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|o| match o {
                Observation::Counter { key, .. } => Some(key.full_name()),
                _ => None,
            })
            .collect()
    }

    /// Sum of all increments for a context-qualified counter name.
    pub fn counter_total(&self, full_name: &str) -> u64 {
        self.lock()
            .iter()
            .filter_map(|o| match o {
                Observation::Counter { key, amount, .. } if key.full_name() == full_name => {
                    Some(*amount)
                }
                _ => None,
            })
            .sum()
    }

    /// Tags of every increment of a counter.
    pub fn counter_tags(&self, full_name: &str) -> Vec<TagSet> {
        self.lock()
            .iter()
            .filter_map(|o| match o {
                Observation::Counter { key, tags, .. } if key.full_name() == full_name => {
                    Some(tags.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn histogram_values(&self, full_name: &str) -> Vec<f64> {
        self.lock()
            .iter()
            .filter_map(|o| match o {
                Observation::Histogram { key, value, .. } if key.full_name() == full_name => {
                    Some(*value)
                }
                _ => None,
            })
            .collect()
    }

    pub fn points(&self) -> Vec<Observation> {
        self.lock()
            .iter()
            .filter(|o| matches!(o, Observation::Point { .. }))
            .cloned()
            .collect()
    }

    pub fn gauge_registrations(&self) -> usize {
        self.lock()
            .iter()
            .filter(|o| matches!(o, Observation::GaugeRegistered { .. }))
            .count()
    }

    /// Current value of a registered gauge, read through its supplier.
    pub fn gauge_value(&self, key: &GaugeKey) -> Option<f64> {
        self.gauges.get(key).map(|supplier| (supplier.value())())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Observation>> {
        self.observations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Transport("sink unavailable".into()));
        }
        Ok(())
    }

    fn record(&self, observation: Observation) {
        self.lock().push(observation);
    }
}

impl MetricsSink for InMemorySink {
    fn register_gauge(&self, key: &GaugeKey, supplier: GaugeSupplier) -> Result<(), SinkError> {
        self.check()?;
        self.gauges.insert(key.clone(), supplier);
        self.record(Observation::GaugeRegistered { key: key.clone() });
        Ok(())
    }

    fn increment_counter(
        &self,
        key: &MetricKey,
        tags: &TagSet,
        amount: u64,
    ) -> Result<(), SinkError> {
        self.check()?;
        self.record(Observation::Counter {
            key: key.clone(),
            tags: tags.clone(),
            amount,
        });
        Ok(())
    }

    fn record_histogram(
        &self,
        key: &MetricKey,
        tags: &TagSet,
        value: f64,
    ) -> Result<(), SinkError> {
        self.check()?;
        self.record(Observation::Histogram {
            key: key.clone(),
            tags: tags.clone(),
            value,
        });
        Ok(())
    }
}

impl PointSender for InMemorySink {
    fn send_metric(
        &self,
        name: &str,
        value: f64,
        timestamp_ms: u64,
        source: &str,
        tags: &TagSet,
    ) -> Result<(), SinkError> {
        self.check()?;
        self.record(Observation::Point {
            name: name.to_string(),
            value,
            timestamp_ms,
            source: source.to_string(),
            tags: tags.clone(),
        });
        Ok(())
    }
}
