//! Periodic component heartbeat.
//!
//! # Responsibilities
//! - Announce that a component of the application is alive
//! - First report after a warm-up delay, then on a fixed period
//!
//! # Design Decisions
//! - Runs on its own Tokio task and stops through a broadcast signal
//! - A failed send is logged; the schedule continues

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::clock::Clock;
use crate::sink::PointSender;
use crate::tags::{
    ApplicationIdentity, TagSet, APPLICATION_TAG_KEY, CLUSTER_TAG_KEY, COMPONENT_TAG_KEY,
    NULL_TAG_VALUE, SERVICE_TAG_KEY, SHARD_TAG_KEY,
};

pub const HEARTBEAT_METRIC: &str = "~component.heartbeat";
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(60);
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(300);

struct Running {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Reports `~component.heartbeat = 1.0` for one component.
pub struct HeartbeatReporter {
    sender: Arc<dyn PointSender>,
    clock: Arc<dyn Clock>,
    source: String,
    tags: TagSet,
    warmup: Duration,
    period: Duration,
    running: Mutex<Option<Running>>,
}

impl HeartbeatReporter {
    pub fn new(
        sender: Arc<dyn PointSender>,
        clock: Arc<dyn Clock>,
        identity: &ApplicationIdentity,
        source: impl Into<String>,
        component: &str,
    ) -> Self {
        let tags = TagSet::new()
            .with(APPLICATION_TAG_KEY, identity.application.as_str())
            .with(
                CLUSTER_TAG_KEY,
                identity.cluster.as_deref().unwrap_or(NULL_TAG_VALUE),
            )
            .with(SERVICE_TAG_KEY, identity.service.as_str())
            .with(
                SHARD_TAG_KEY,
                identity.shard.as_deref().unwrap_or(NULL_TAG_VALUE),
            )
            .with(COMPONENT_TAG_KEY, component);
        Self {
            sender,
            clock,
            source: source.into(),
            tags,
            warmup: DEFAULT_WARMUP,
            period: DEFAULT_PERIOD,
            running: Mutex::new(None),
        }
    }

    pub fn with_schedule(mut self, warmup: Duration, period: Duration) -> Self {
        self.warmup = warmup;
        self.period = period;
        self
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Arm the schedule. Must be called inside a Tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return;
        }

        let (shutdown, mut rx) = broadcast::channel(1);
        let sender = self.sender.clone();
        let clock = self.clock.clone();
        let source = self.source.clone();
        let tags = self.tags.clone();
        let period = self.period.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + self.warmup, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        beat(sender.as_ref(), clock.as_ref(), &source, &tags);
                    }
                    _ = rx.recv() => {
                        tracing::debug!("Heartbeat stopped");
                        break;
                    }
                }
            }
        });

        tracing::info!(
            warmup_secs = self.warmup.as_secs(),
            period_secs = self.period.as_secs(),
            "Heartbeat scheduled"
        );
        *running = Some(Running { shutdown, handle });
    }

    /// Cancel future firings. Does not wait for a send in progress.
    pub fn stop(&self) {
        let taken = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = taken {
            let _ = running.shutdown.send(());
            running.handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for HeartbeatReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn beat(sender: &dyn PointSender, clock: &dyn Clock, source: &str, tags: &TagSet) {
    let timestamp = clock.now_millis();
    match sender.send_metric(HEARTBEAT_METRIC, 1.0, timestamp, source, tags) {
        Ok(()) => tracing::trace!(source = %source, "Heartbeat sent"),
        Err(e) => tracing::warn!(error = %e, "Failed to send heartbeat"),
    }
}
