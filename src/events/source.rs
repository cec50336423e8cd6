//! Named event sources and the registry that announces them.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use arc_swap::ArcSwap;

use super::{LifecycleEvent, Observer};

/// Callback invoked once for every source in the registry.
pub type SourceWatcher = Arc<dyn Fn(&Arc<EventSource>) + Send + Sync>;

/// Handle returned by [`SourceRegistry::watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

struct Subscriber {
    id: u64,
    observer: Arc<dyn Observer>,
}

/// A named stream of lifecycle events.
pub struct EventSource {
    name: String,
    subscribers: ArcSwap<Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
}

impl EventSource {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether anyone is listening. Hosts use this to skip building payloads.
    pub fn is_enabled(&self) -> bool {
        !self.subscribers.load().is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load().len()
    }

    /// Attach an observer. Dropping the returned handle detaches it.
    pub fn subscribe(self: &Arc<Self>, observer: Arc<dyn Observer>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber { id, observer });
        self.subscribers.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(subscriber.clone());
            next
        });
        Subscription {
            source: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers.rcu(|current| {
            current
                .iter()
                .filter(|s| s.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    /// Deliver an event to every subscriber.
    ///
    /// Errors and panics raised by an observer are logged here and never
    /// reach the host or the remaining observers.
    pub fn emit(&self, event: &LifecycleEvent) {
        let subscribers = self.subscribers.load();
        for subscriber in subscribers.iter() {
            let observer = &subscriber.observer;
            match catch_unwind(AssertUnwindSafe(|| observer.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        source = %self.name,
                        observer = %observer.name(),
                        event = event.name(),
                        error = %e,
                        "Observer failed to handle event"
                    );
                }
                Err(panic) => {
                    tracing::error!(
                        source = %self.name,
                        observer = %observer.name(),
                        event = event.name(),
                        panic = %panic_message(panic.as_ref()),
                        "Observer panicked while handling event"
                    );
                }
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// RAII subscription; dropping it detaches the observer.
pub struct Subscription {
    source: Weak<EventSource>,
    id: u64,
}

impl Subscription {
    pub fn source_name(&self) -> Option<String> {
        self.source.upgrade().map(|s| s.name.clone())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(source) = self.source.upgrade() {
            source.unsubscribe(self.id);
        }
    }
}

#[derive(Default)]
struct RegistryState {
    sources: Vec<Arc<EventSource>>,
    watchers: Vec<(WatchId, SourceWatcher)>,
}

/// Process-wide registry of event sources.
///
/// Watchers see every source exactly once: sources that already exist are
/// replayed when the watcher is added, later ones are announced on
/// registration. The bookkeeping happens under one lock; the callbacks run
/// outside it.
#[derive(Default)]
pub struct SourceRegistry {
    state: Mutex<RegistryState>,
    next_watch: AtomicU64,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a source, or return the existing one with the same name.
    pub fn register_source(&self, name: &str) -> Arc<EventSource> {
        let (source, watchers) = {
            let mut state = self.lock();
            if let Some(existing) = state.sources.iter().find(|s| s.name == name) {
                return existing.clone();
            }
            let source = Arc::new(EventSource::new(name));
            state.sources.push(source.clone());
            let watchers: Vec<SourceWatcher> =
                state.watchers.iter().map(|(_, w)| w.clone()).collect();
            (source, watchers)
        };

        tracing::debug!(source = %name, watchers = watchers.len(), "Event source registered");
        for watcher in watchers {
            watcher(&source);
        }
        source
    }

    /// Add a watcher and replay the sources registered so far.
    pub fn watch(&self, watcher: SourceWatcher) -> WatchId {
        let id = WatchId(self.next_watch.fetch_add(1, Ordering::Relaxed));
        let existing = {
            let mut state = self.lock();
            state.watchers.push((id, watcher.clone()));
            state.sources.clone()
        };

        for source in &existing {
            watcher(source);
        }
        id
    }

    pub fn unwatch(&self, id: WatchId) {
        self.lock().watchers.retain(|(w, _)| *w != id);
    }

    pub fn sources(&self) -> Vec<Arc<EventSource>> {
        self.lock().sources.clone()
    }

    pub fn source(&self, name: &str) -> Option<Arc<EventSource>> {
        self.lock().sources.iter().find(|s| s.name == name).cloned()
    }
}
