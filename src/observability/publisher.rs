//! Periodic publication of supplier-backed gauges.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::sink::RecorderSink;

/// Pushes every registered gauge to the recorder once per interval.
pub struct GaugePublisher {
    sink: Arc<RecorderSink>,
    interval: Duration,
}

impl GaugePublisher {
    pub fn new(sink: Arc<RecorderSink>, interval: Duration) -> Self {
        Self {
            sink,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Run until the shutdown signal fires, publishing once more on exit.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sink.publish_gauges();
                        tracing::trace!(gauges = self.sink.registered_gauges(), "Gauges published");
                    }
                    _ = shutdown.recv() => {
                        self.sink.publish_gauges();
                        tracing::debug!("Gauge publisher stopped");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::tags::ApplicationIdentity;

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let sink = Arc::new(RecorderSink::new(&ApplicationIdentity::new("shop", "cart")));
        let shutdown = Shutdown::new();
        let handle = GaugePublisher::new(sink, Duration::from_millis(10)).spawn(shutdown.subscribe());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("publisher did not stop")
            .unwrap();
    }
}
