//! Gauge registry with lazy, exactly-once sink registration.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::GaugeKey;
use crate::sink::MetricsSink;

/// Registry of in-flight counters.
pub struct GaugeRegistry {
    gauges: DashMap<GaugeKey, Arc<AtomicI64>>,
    sink: Arc<dyn MetricsSink>,
}

impl GaugeRegistry {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            gauges: DashMap::new(),
            sink,
        }
    }

    /// Return the counter for `key`, creating and registering it on first touch.
    ///
    /// The entry's shard lock is held while the sink registration runs, so
    /// concurrent first access from parallel requests registers once. The
    /// sink must not call back into this registry from `register_gauge`.
    pub fn get_or_create(&self, key: &GaugeKey) -> Arc<AtomicI64> {
        if let Some(existing) = self.gauges.get(key) {
            return existing.value().clone();
        }

        self.gauges
            .entry(key.clone())
            .or_insert_with(|| {
                let counter = Arc::new(AtomicI64::new(0));
                let supplier_counter = counter.clone();
                if let Err(e) = self.sink.register_gauge(
                    key,
                    Arc::new(move || supplier_counter.load(Ordering::Relaxed) as f64),
                ) {
                    tracing::warn!(gauge = %key.full_name(), error = %e, "Gauge registration failed");
                }
                counter
            })
            .value()
            .clone()
    }

    pub fn increment(&self, key: &GaugeKey) {
        self.get_or_create(key).fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self, key: &GaugeKey) {
        self.get_or_create(key).fetch_sub(1, Ordering::Relaxed);
    }

    /// Current value, or `None` if the key was never touched.
    pub fn value(&self, key: &GaugeKey) -> Option<i64> {
        self.gauges.get(key).map(|g| g.load(Ordering::Relaxed))
    }

    pub fn len(&self) -> usize {
        self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
    }
}

/// A RAII guard holding one increment on each of a set of gauges.
///
/// Dropping the guard applies the matching decrements, so a request that is
/// abandoned before completion still releases what it incremented.
pub struct InflightGuard {
    counters: Vec<Arc<AtomicI64>>,
}

impl InflightGuard {
    /// Increment every key and remember the counters for release.
    pub fn acquire(registry: &GaugeRegistry, keys: &[GaugeKey]) -> Self {
        let counters = keys
            .iter()
            .map(|key| {
                let counter = registry.get_or_create(key);
                counter.fetch_add(1, Ordering::Relaxed);
                counter
            })
            .collect();
        Self { counters }
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        for counter in &self.counters {
            counter.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::InMemorySink;
    use crate::tags::TagSet;

    fn key(name: &str) -> GaugeKey {
        GaugeKey::new("http.server", name, TagSet::new().with("service", "cart"))
    }

    #[test]
    fn test_lazy_registration_once() {
        let sink = Arc::new(InMemorySink::new());
        let registry = GaugeRegistry::new(sink.clone());

        assert_eq!(registry.value(&key("a")), None);
        registry.increment(&key("a"));
        registry.increment(&key("a"));
        registry.decrement(&key("a"));

        assert_eq!(registry.value(&key("a")), Some(1));
        assert_eq!(sink.gauge_registrations(), 1);
        assert_eq!(sink.gauge_value(&key("a")), Some(1.0));
    }

    #[test]
    fn test_concurrent_first_access_registers_once() {
        let sink = Arc::new(InMemorySink::new());
        let registry = Arc::new(GaugeRegistry::new(sink.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        registry.increment(&key("hot"));
                        registry.decrement(&key("hot"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(sink.gauge_registrations(), 1);
        assert_eq!(registry.value(&key("hot")), Some(0));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let registry = GaugeRegistry::new(Arc::new(InMemorySink::new()));
        let keys = [key("route"), key("total")];

        let guard = InflightGuard::acquire(&registry, &keys);
        assert_eq!(guard.len(), 2);
        assert_eq!(registry.value(&keys[0]), Some(1));
        assert_eq!(registry.value(&keys[1]), Some(1));

        drop(guard);
        assert_eq!(registry.value(&keys[0]), Some(0));
        assert_eq!(registry.value(&keys[1]), Some(0));
    }
}
