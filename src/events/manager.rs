//! Subscription lifecycle for registered observers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::source::{EventSource, SourceRegistry, Subscription, WatchId};
use super::Observer;

#[derive(Default)]
struct ManagerState {
    running: bool,
    /// Bumped on every start; callbacks from an earlier run are ignored.
    generation: u64,
    observers: Vec<Arc<dyn Observer>>,
    subscriptions: Vec<Subscription>,
}

struct ManagerInner {
    registry: Arc<SourceRegistry>,
    state: Mutex<ManagerState>,
    /// Serializes start/stop; never taken by registry callbacks.
    lifecycle: Mutex<Option<WatchId>>,
}

impl ManagerInner {
    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe every accepting observer to a newly seen source.
    ///
    /// Runs under the state lock, so a concurrent `stop()` either sees these
    /// subscriptions and drops them, or has already cleared `running`.
    fn attach(&self, source: &Arc<EventSource>, generation: u64) {
        let mut state = self.state();
        if !state.running || state.generation != generation {
            return;
        }

        let matching: Vec<Arc<dyn Observer>> = state
            .observers
            .iter()
            .filter(|o| o.accepts(source.name()))
            .cloned()
            .collect();
        for observer in matching {
            tracing::debug!(
                source = %source.name(),
                observer = %observer.name(),
                "Subscribing observer"
            );
            let subscription = source.subscribe(observer);
            state.subscriptions.push(subscription);
        }
    }
}

/// Attaches registered observers to every matching event source.
///
/// `start` and `stop` are idempotent and never fail.
pub struct EventSubscriptionManager {
    inner: Arc<ManagerInner>,
}

impl EventSubscriptionManager {
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry,
                state: Mutex::new(ManagerState::default()),
                lifecycle: Mutex::new(None),
            }),
        }
    }

    /// Add an observer. Observers registered while running are attached to
    /// the sources announced after that point.
    pub fn register(&self, observer: Arc<dyn Observer>) {
        self.inner.state().observers.push(observer);
    }

    /// Begin watching the registry. Existing sources are replayed.
    pub fn start(&self) {
        let mut watch = self
            .inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if watch.is_some() {
            return;
        }

        let generation = {
            let mut state = self.inner.state();
            state.running = true;
            state.generation += 1;
            state.generation
        };

        let weak: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        let id = self.inner.registry.watch(Arc::new(move |source: &Arc<EventSource>| {
            if let Some(inner) = weak.upgrade() {
                inner.attach(source, generation);
            }
        }));
        *watch = Some(id);

        tracing::info!(
            subscriptions = self.subscription_count(),
            "Event subscription manager started"
        );
    }

    /// Stop watching and drop every active subscription.
    pub fn stop(&self) {
        let mut watch = self
            .inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(id) = watch.take() else {
            return;
        };

        self.inner.registry.unwatch(id);
        let subscriptions = {
            let mut state = self.inner.state();
            state.running = false;
            std::mem::take(&mut state.subscriptions)
        };
        let dropped = subscriptions.len();
        drop(subscriptions);

        tracing::info!(dropped, "Event subscription manager stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.state().running
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.state().subscriptions.len()
    }
}

impl Drop for EventSubscriptionManager {
    fn drop(&mut self) {
        self.stop();
    }
}
