//! Inbound request lifecycle observer.

use std::sync::Arc;

use crate::clock::Clock;
use crate::emitter::{AggregationEmitter, RequestOutcome};
use crate::error::Result;
use crate::events::{Fault, LifecycleEvent, Observer, RouteDescriptor, SERVER_SOURCE};
use crate::gauge::{GaugeKey, GaugeRegistry, InflightGuard};
use crate::naming::metric_name;
use crate::tags::{TagSetBuilder, CONTROLLER_TAG_KEY};
use crate::tracer::{
    is_error_status, log_error, status_tag, SpanBuilder, SpanKind, Tracer, COMPONENT, ERROR,
    HTTP_METHOD, HTTP_PATH, HTTP_STATUS_CODE, HTTP_URL, SPAN_KIND, SPAN_KIND_SERVER,
};

use super::context::{RequestScope, ResolvedRoute};

/// Response header carrying the resolved route template.
pub const SPAN_NAME_HEADER: &str = "x-span-name";

/// Value of the `component` span tag for server spans.
pub const SERVER_COMPONENT: &str = "http-server";

const TOTAL_INFLIGHT: &str = "total_requests.inflight";
const INFLIGHT_SUFFIX: &str = "inflight";
const STATUS_ON_EXCEPTION: u16 = 500;

/// Turns inbound request events into gauges, response metrics and spans.
///
/// Requests move through `Started → ActionSelected → Completed`, with an
/// optional exception before completion. Requests whose route yields no
/// metric name still get a span but produce no metrics.
pub struct RequestLifecycleObserver {
    tracer: Arc<dyn Tracer>,
    gauges: Arc<GaugeRegistry>,
    emitter: AggregationEmitter,
    builder: TagSetBuilder,
    clock: Arc<dyn Clock>,
    total_inflight: GaugeKey,
}

impl RequestLifecycleObserver {
    pub fn new(
        tracer: Arc<dyn Tracer>,
        gauges: Arc<GaugeRegistry>,
        emitter: AggregationEmitter,
        builder: TagSetBuilder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let total_inflight = GaugeKey::new(
            emitter.context(),
            TOTAL_INFLIGHT,
            builder.overall().full().clone(),
        );
        Self {
            tracer,
            gauges,
            emitter,
            builder,
            clock,
            total_inflight,
        }
    }

    pub fn total_inflight_key(&self) -> &GaugeKey {
        &self.total_inflight
    }

    fn on_start(&self, scope: &RequestScope) {
        let start_ms = self.clock.now_millis();

        let span = if self.tracer.is_noop() {
            None
        } else {
            let parent = self.tracer.extract(scope.headers());
            Some(
                self.tracer.start_span(
                    SpanBuilder::new(scope.method())
                        .with_kind(SpanKind::Server)
                        .child_of(parent)
                        .with_tag(SPAN_KIND, SPAN_KIND_SERVER)
                        .with_tag(COMPONENT, SERVER_COMPONENT)
                        .with_tag(HTTP_METHOD, scope.method().to_string())
                        .with_tag(HTTP_URL, scope.display_url().to_string()),
                ),
            )
        };

        scope.with_context(|ctx| {
            ctx.start_ms = Some(start_ms);
            ctx.span = span;
        });
    }

    fn on_action(&self, scope: &RequestScope, route: &RouteDescriptor) {
        let template = route.template.as_deref();
        let controller = route.controller.as_deref();
        let action = route.action.as_deref();
        let name = template.and_then(|t| metric_name(scope.method(), t));

        if let Some(template) = template {
            scope.set_response_header(SPAN_NAME_HEADER, template);
        }

        if let Some(mut span) = scope.with_context(|ctx| ctx.span.take()) {
            let operation = match (controller, action) {
                (Some(c), Some(a)) => format!("{c}.{a}"),
                _ => template.unwrap_or(scope.method()).to_string(),
            };
            span.set_operation_name(&operation);
            if let Some(controller) = controller {
                span.set_tag(CONTROLLER_TAG_KEY, controller.to_string().into());
            }
            if let Some(template) = template {
                span.set_tag(HTTP_PATH, template.to_string().into());
            }
            scope.with_context(|ctx| ctx.span = Some(span));
        }

        let (tier_tags, inflight) = match &name {
            Some(name) => {
                let tiers = self.builder.tier_tags(controller, action);
                let keys = [
                    GaugeKey::new(
                        self.emitter.context(),
                        format!("{}.{INFLIGHT_SUFFIX}", name.request_prefix()),
                        tiers.full().clone(),
                    ),
                    self.total_inflight.clone(),
                ];
                let guard = InflightGuard::acquire(&self.gauges, &keys);
                (Some(tiers), Some(guard))
            }
            None => {
                tracing::debug!(
                    request_id = %scope.request_id(),
                    template = ?template,
                    "Route has no metric name, skipping metrics"
                );
                (None, None)
            }
        };

        let resolved = ResolvedRoute {
            template: route.template.clone(),
            controller: route.controller.clone(),
            action: route.action.clone(),
            metric_name: name,
            tier_tags,
        };
        // A replaced guard releases its increments on drop, outside the lock.
        let previous = scope.with_context(|ctx| {
            ctx.route = Some(resolved);
            std::mem::replace(&mut ctx.inflight, inflight)
        });
        drop(previous);
    }

    fn on_exception(&self, scope: &RequestScope, fault: &Fault) {
        let span = scope.with_context(|ctx| {
            ctx.exception = Some(fault.clone());
            ctx.span.take()
        });
        if let Some(mut span) = span {
            log_error(span.as_mut(), &fault.kind, &fault.message);
            scope.with_context(|ctx| ctx.span = Some(span));
        }
    }

    fn on_complete(&self, scope: &RequestScope, status: u16) {
        let taken = scope.with_context(|ctx| {
            if ctx.finalized {
                return None;
            }
            ctx.finalized = true;
            Some((
                ctx.start_ms,
                ctx.exception.take(),
                ctx.span.take(),
                ctx.route.take(),
                ctx.inflight.take(),
            ))
        });
        let Some((start_ms, exception, span, route, inflight)) = taken else {
            tracing::debug!(request_id = %scope.request_id(), "Request already completed, ignoring");
            return;
        };
        drop(inflight);

        let status = if exception.is_some() {
            STATUS_ON_EXCEPTION
        } else {
            status
        };

        if let Some(mut span) = span {
            span.set_tag(HTTP_STATUS_CODE, status_tag(status));
            if is_error_status(status) {
                span.set_tag(ERROR, true.into());
            }
            span.finish();
        }

        let latency_ms = start_ms.map(|start| self.clock.now_millis().saturating_sub(start));

        let Some(route) = route else {
            return;
        };
        if let (Some(name), Some(tier_tags)) = (&route.metric_name, &route.tier_tags) {
            self.emitter.emit(&RequestOutcome {
                metric_name: name,
                status,
                tier_tags,
                latency_ms,
            });
            tracing::trace!(
                request_id = %scope.request_id(),
                metric = %name,
                status,
                latency_ms = ?latency_ms,
                "Request telemetry emitted"
            );
        }
    }
}

impl Observer for RequestLifecycleObserver {
    fn name(&self) -> &str {
        "request-lifecycle"
    }

    fn accepts(&self, source_name: &str) -> bool {
        source_name == SERVER_SOURCE
    }

    fn on_event(&self, event: &LifecycleEvent) -> Result<()> {
        match event {
            LifecycleEvent::RequestStarted { scope: Some(scope) } => self.on_start(scope),
            LifecycleEvent::ActionSelected {
                scope: Some(scope),
                route: Some(route),
            } => self.on_action(scope, route),
            LifecycleEvent::UnhandledException {
                scope: Some(scope),
                fault: Some(fault),
            } => self.on_exception(scope, fault),
            LifecycleEvent::RequestCompleted {
                scope: Some(scope),
                status: Some(status),
            } => self.on_complete(scope, *status),
            LifecycleEvent::OutboundStarted { .. }
            | LifecycleEvent::OutboundFailed { .. }
            | LifecycleEvent::OutboundCompleted { .. } => {}
            other => {
                tracing::debug!(event = other.name(), "Event payload incomplete, skipping");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sink::InMemorySink;
    use crate::tags::ApplicationIdentity;
    use crate::tracer::{NoopTracer, RecordingTracer, TagValue};
    use axum::http::HeaderMap;

    struct Fixture {
        sink: Arc<InMemorySink>,
        gauges: Arc<GaugeRegistry>,
        clock: Arc<ManualClock>,
        observer: RequestLifecycleObserver,
    }

    fn fixture(tracer: Arc<dyn Tracer>) -> Fixture {
        let sink = Arc::new(InMemorySink::new());
        let gauges = Arc::new(GaugeRegistry::new(sink.clone()));
        let clock = Arc::new(ManualClock::new(1_000));
        let builder = TagSetBuilder::new(Arc::new(ApplicationIdentity::new("shop", "cart")), "host-1");
        let emitter = AggregationEmitter::new(sink.clone(), &builder, "http.server");
        let observer =
            RequestLifecycleObserver::new(tracer, gauges.clone(), emitter, builder, clock.clone());
        Fixture {
            sink,
            gauges,
            clock,
            observer,
        }
    }

    fn scope() -> Arc<RequestScope> {
        Arc::new(RequestScope::new("GET", "http://localhost/api/items/7", HeaderMap::new()))
    }

    fn route() -> RouteDescriptor {
        RouteDescriptor::new("api/items/{id}").with_handler("Items", "get")
    }

    #[test]
    fn test_full_lifecycle_with_noop_tracer() {
        let f = fixture(Arc::new(NoopTracer));
        let scope = scope();

        f.observer.on_event(&LifecycleEvent::started(&scope)).unwrap();
        f.observer
            .on_event(&LifecycleEvent::action_selected(&scope, route()))
            .unwrap();
        assert_eq!(f.gauges.value(f.observer.total_inflight_key()), Some(1));
        assert_eq!(scope.response_header(SPAN_NAME_HEADER).as_deref(), Some("api/items/{id}"));

        f.clock.advance(42);
        f.observer.on_event(&LifecycleEvent::completed(&scope, 200)).unwrap();

        assert_eq!(f.gauges.value(f.observer.total_inflight_key()), Some(0));
        assert_eq!(
            f.sink.counter_total("http.server.response.api.items._id_.GET.200.cumulative"),
            1
        );
        assert_eq!(
            f.sink.histogram_values("http.server.response.api.items._id_.GET.200.latency"),
            vec![42.0]
        );
    }

    #[test]
    fn test_second_completion_is_ignored() {
        let f = fixture(Arc::new(NoopTracer));
        let scope = scope();
        f.observer.on_event(&LifecycleEvent::started(&scope)).unwrap();
        f.observer
            .on_event(&LifecycleEvent::action_selected(&scope, route()))
            .unwrap();
        f.observer.on_event(&LifecycleEvent::completed(&scope, 200)).unwrap();
        f.observer.on_event(&LifecycleEvent::completed(&scope, 200)).unwrap();

        assert_eq!(
            f.sink.counter_total("http.server.response.api.items._id_.GET.200.cumulative"),
            1
        );
        assert_eq!(f.gauges.value(f.observer.total_inflight_key()), Some(0));
    }

    #[test]
    fn test_exception_forces_500_and_marks_span() {
        let tracer = Arc::new(RecordingTracer::new());
        let f = fixture(tracer.clone());
        let scope = scope();

        f.observer.on_event(&LifecycleEvent::started(&scope)).unwrap();
        f.observer
            .on_event(&LifecycleEvent::action_selected(&scope, route()))
            .unwrap();
        f.observer
            .on_event(&LifecycleEvent::exception(&scope, Fault::new("Panic", "boom")))
            .unwrap();
        f.observer.on_event(&LifecycleEvent::completed(&scope, 200)).unwrap();

        assert_eq!(f.sink.counter_total("http.server.response.api.items._id_.GET.500.cumulative"), 1);
        assert_eq!(f.sink.counter_total("http.server.response.errors"), 1);

        let spans = tracer.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].operation_name, "Items.get");
        assert_eq!(spans[0].tag(HTTP_STATUS_CODE), Some(&status_tag(500)));
        assert_eq!(spans[0].tag(ERROR), Some(&TagValue::Bool(true)));
        assert_eq!(spans[0].logs.len(), 1);
    }

    #[test]
    fn test_unmetricable_route_emits_nothing() {
        let f = fixture(Arc::new(NoopTracer));
        let scope = scope();
        f.observer.on_event(&LifecycleEvent::started(&scope)).unwrap();
        f.observer
            .on_event(&LifecycleEvent::action_selected(&scope, RouteDescriptor::new("/")))
            .unwrap();
        f.observer.on_event(&LifecycleEvent::completed(&scope, 200)).unwrap();

        assert!(f.sink.counter_names().is_empty());
        assert!(f.gauges.is_empty());
    }

    #[test]
    fn test_missing_payload_is_skipped() {
        let f = fixture(Arc::new(NoopTracer));
        f.observer
            .on_event(&LifecycleEvent::RequestCompleted {
                scope: None,
                status: Some(200),
            })
            .unwrap();
        f.observer
            .on_event(&LifecycleEvent::RequestCompleted {
                scope: Some(scope()),
                status: None,
            })
            .unwrap();
        assert!(f.sink.observations().is_empty());
    }

    #[test]
    fn test_dropped_scope_releases_gauges() {
        let f = fixture(Arc::new(NoopTracer));
        let scope = scope();
        f.observer.on_event(&LifecycleEvent::started(&scope)).unwrap();
        f.observer
            .on_event(&LifecycleEvent::action_selected(&scope, route()))
            .unwrap();
        assert_eq!(f.gauges.value(f.observer.total_inflight_key()), Some(1));

        drop(scope);
        assert_eq!(f.gauges.value(f.observer.total_inflight_key()), Some(0));
    }
}
