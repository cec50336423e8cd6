//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use request_telemetry::clock::ManualClock;
use request_telemetry::gauge::GaugeKey;
use request_telemetry::naming::metric_name;
use request_telemetry::sink::InMemorySink;
use request_telemetry::tracer::RecordingTracer;
use request_telemetry::{ApplicationIdentity, Instrumentation};

pub const SOURCE: &str = "host-1";

/// A started pipeline with inspectable sink, clock and tracer.
pub struct Harness {
    pub instrumentation: Arc<Instrumentation>,
    pub sink: Arc<InMemorySink>,
    pub tracer: Arc<RecordingTracer>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(identity: ApplicationIdentity) -> Self {
        let sink = Arc::new(InMemorySink::new());
        let tracer = Arc::new(RecordingTracer::new());
        let clock = Arc::new(ManualClock::new(10_000));
        let instrumentation = Instrumentation::builder(identity)
            .source(SOURCE)
            .sink(sink.clone())
            .tracer(tracer.clone())
            .clock(clock.clone())
            .build();
        instrumentation.start();
        Self {
            instrumentation: Arc::new(instrumentation),
            sink,
            tracer,
            clock,
        }
    }

    /// Key of the route-independent in-flight gauge.
    pub fn total_inflight_key(&self) -> GaugeKey {
        GaugeKey::new(
            self.instrumentation.context(),
            "total_requests.inflight",
            self.instrumentation.tag_builder().overall().full().clone(),
        )
    }

    /// Key of the per-route in-flight gauge for a GET handler.
    pub fn route_inflight_key(&self, template: &str, controller: &str, action: &str) -> GaugeKey {
        let name = metric_name("GET", template).expect("template has no metric name");
        GaugeKey::new(
            self.instrumentation.context(),
            format!("{}.inflight", name.request_prefix()),
            self.instrumentation
                .tag_builder()
                .tier_tags(Some(controller), Some(action))
                .full()
                .clone(),
        )
    }
}

pub fn shop_cart() -> ApplicationIdentity {
    ApplicationIdentity::new("shop", "cart")
}

/// Serve `router` on an ephemeral local port.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}
