//! Assembles the capture pipeline.
//!
//! # Responsibilities
//! - Build the source registry, both event sources and both observers
//! - Share one gauge registry, sink, tracer and clock between them
//! - Hand out host adapters and heartbeat reporters bound to this pipeline
//!
//! # Data Flow
//! ```text
//! Instrumentation::builder(identity)
//!     .source / .context / .tracer / .sink / .clock
//!     .build()
//!         → SourceRegistry + "http.server" / "http.client" sources
//!         → EventSubscriptionManager (server + client observers registered)
//!         → version gauge registered with the sink
//! start() → observers attached, events flow
//! stop()  → observers detached
//! ```

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::emitter::AggregationEmitter;
use crate::events::{
    EventSource, EventSubscriptionManager, SourceRegistry, CLIENT_SOURCE, SERVER_SOURCE,
};
use crate::gauge::{GaugeKey, GaugeRegistry};
use crate::heartbeat::HeartbeatReporter;
use crate::host::{HostState, InstrumentedClient, RouteCatalog};
use crate::observer::{OutboundRequestObserver, RequestLifecycleObserver};
use crate::sink::{MetricsSink, PointSender, RecorderSink};
use crate::tags::{ApplicationIdentity, TagSetBuilder};
use crate::tracer::{NoopTracer, Tracer};

/// Default metric context.
pub const DEFAULT_CONTEXT: &str = "http.server";

const SDK_CONTEXT: &str = "~sdk.rust.request_telemetry";
const VERSION_GAUGE: &str = "version";

pub struct InstrumentationBuilder {
    identity: ApplicationIdentity,
    source: String,
    context: String,
    tracer: Arc<dyn Tracer>,
    sink: Option<Arc<dyn MetricsSink>>,
    clock: Arc<dyn Clock>,
}

impl InstrumentationBuilder {
    /// Host label placed on per-source metrics.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Defaults to a [`RecorderSink`] for the identity.
    pub fn sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Instrumentation {
        let identity = Arc::new(self.identity);
        let sink: Arc<dyn MetricsSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(RecorderSink::new(&identity)),
        };
        let builder = TagSetBuilder::new(identity.clone(), self.source);
        let gauges = Arc::new(GaugeRegistry::new(sink.clone()));
        let emitter = AggregationEmitter::new(sink.clone(), &builder, self.context.as_str());

        let registry = Arc::new(SourceRegistry::new());
        let manager = EventSubscriptionManager::new(registry.clone());
        manager.register(Arc::new(RequestLifecycleObserver::new(
            self.tracer.clone(),
            gauges.clone(),
            emitter,
            builder.clone(),
            self.clock.clone(),
        )));
        manager.register(Arc::new(OutboundRequestObserver::new(self.tracer.clone())));

        let server_source = registry.register_source(SERVER_SOURCE);
        let client_source = registry.register_source(CLIENT_SOURCE);

        register_version_gauge(sink.as_ref(), &builder);

        tracing::info!(
            application = %identity.application,
            service = %identity.service,
            source = %builder.source(),
            context = %self.context,
            tracing = !self.tracer.is_noop(),
            "Request telemetry initialized"
        );

        Instrumentation {
            identity,
            builder,
            context: self.context,
            registry,
            manager,
            server_source,
            client_source,
            gauges,
            clock: self.clock,
        }
    }
}

fn register_version_gauge(sink: &dyn MetricsSink, builder: &TagSetBuilder) {
    let key = GaugeKey::new(SDK_CONTEXT, VERSION_GAUGE, builder.overall().full().clone());
    let version = semver_value(env!("CARGO_PKG_VERSION"));
    if let Err(e) = sink.register_gauge(&key, Arc::new(move || version)) {
        tracing::warn!(gauge = %key.full_name(), error = %e, "Failed to register version gauge");
    }
}

/// `major.minor.patch` as `major.MMPP`, e.g. `1.2.3` → `1.0203`.
pub fn semver_value(version: &str) -> f64 {
    let mut parts = version
        .split(['.', '-', '+'])
        .map(|p| p.parse::<u64>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);
    format!("{major}.{minor:02}{patch:02}").parse().unwrap_or(0.0)
}

/// A ready capture pipeline.
pub struct Instrumentation {
    identity: Arc<ApplicationIdentity>,
    builder: TagSetBuilder,
    context: String,
    registry: Arc<SourceRegistry>,
    manager: EventSubscriptionManager,
    server_source: Arc<EventSource>,
    client_source: Arc<EventSource>,
    gauges: Arc<GaugeRegistry>,
    clock: Arc<dyn Clock>,
}

impl Instrumentation {
    pub fn builder(identity: ApplicationIdentity) -> InstrumentationBuilder {
        InstrumentationBuilder {
            identity,
            source: "localhost".to_string(),
            context: DEFAULT_CONTEXT.to_string(),
            tracer: Arc::new(NoopTracer),
            sink: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Attach the observers; events start producing telemetry.
    pub fn start(&self) {
        self.manager.start();
    }

    pub fn stop(&self) {
        self.manager.stop();
    }

    pub fn identity(&self) -> &ApplicationIdentity {
        &self.identity
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    pub fn manager(&self) -> &EventSubscriptionManager {
        &self.manager
    }

    pub fn server_source(&self) -> &Arc<EventSource> {
        &self.server_source
    }

    pub fn client_source(&self) -> &Arc<EventSource> {
        &self.client_source
    }

    pub fn gauges(&self) -> &Arc<GaugeRegistry> {
        &self.gauges
    }

    pub fn tag_builder(&self) -> &TagSetBuilder {
        &self.builder
    }

    /// State for [`crate::host::instrument`].
    pub fn host_state(&self, catalog: RouteCatalog) -> HostState {
        HostState::new(self.server_source.clone(), catalog)
    }

    pub fn client(&self, client: reqwest::Client) -> InstrumentedClient {
        InstrumentedClient::new(client, self.client_source.clone())
    }

    /// Heartbeat for `component`, tagged with this pipeline's identity.
    pub fn heartbeat(&self, sender: Arc<dyn PointSender>, component: &str) -> HeartbeatReporter {
        HeartbeatReporter::new(
            sender,
            self.clock.clone(),
            &self.identity,
            self.builder.source(),
            component,
        )
    }
}
