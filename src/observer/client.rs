//! Outbound request observer: client spans and context propagation.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::error::Result;
use crate::events::{Fault, LifecycleEvent, Observer, TaskOutcome, CLIENT_SOURCE};
use crate::tracer::{
    is_error_status, log_error, status_tag, SpanBuilder, SpanKind, Tracer, COMPONENT, ERROR,
    HTTP_METHOD, HTTP_STATUS_CODE, HTTP_URL, SPAN_KIND, SPAN_KIND_CLIENT,
};

use super::context::OutboundScope;
use super::server::SPAN_NAME_HEADER;

/// Requests carrying this header are not traced.
pub const IGNORE_HEADER: &str = "x-telemetry-ignore";

pub const CLIENT_COMPONENT: &str = "http-client";

pub struct OutboundRequestObserver {
    tracer: Arc<dyn Tracer>,
}

impl OutboundRequestObserver {
    pub fn new(tracer: Arc<dyn Tracer>) -> Self {
        Self { tracer }
    }

    fn on_start(&self, scope: &OutboundScope) {
        if self.tracer.is_noop() || scope.with_headers(|h| h.contains_key(IGNORE_HEADER)) {
            return;
        }

        let span = self.tracer.start_span(
            SpanBuilder::new(scope.method())
                .with_kind(SpanKind::Client)
                .with_tag(SPAN_KIND, SPAN_KIND_CLIENT)
                .with_tag(COMPONENT, CLIENT_COMPONENT)
                .with_tag(HTTP_METHOD, scope.method().to_string())
                .with_tag(HTTP_URL, scope.url().to_string()),
        );
        let mut headers = scope.headers();
        self.tracer.inject(&span.context(), &mut headers);
        scope.with_headers(|h| *h = headers);
        scope.store_span(span);
    }

    fn on_failed(&self, scope: &OutboundScope, fault: &Fault) {
        if let Some(mut span) = scope.take_span() {
            log_error(span.as_mut(), &fault.kind, &fault.message);
            scope.store_span(span);
        }
    }

    fn on_completed(
        &self,
        scope: &OutboundScope,
        status: Option<u16>,
        response_headers: Option<&HeaderMap>,
        outcome: TaskOutcome,
    ) {
        let Some(mut span) = scope.take_span() else {
            return;
        };

        if let Some(status) = status {
            span.set_tag(HTTP_STATUS_CODE, status_tag(status));
        }
        let failed = outcome != TaskOutcome::Completed || status.is_some_and(is_error_status);
        if failed {
            span.set_tag(ERROR, true.into());
        }

        let server_route = response_headers
            .and_then(|h| h.get(SPAN_NAME_HEADER))
            .and_then(|v| v.to_str().ok());
        if let Some(route) = server_route {
            span.set_operation_name(&format!("{}-{route}", scope.method()));
        }
        span.finish();
    }
}

impl Observer for OutboundRequestObserver {
    fn name(&self) -> &str {
        "outbound-request"
    }

    fn accepts(&self, source_name: &str) -> bool {
        source_name == CLIENT_SOURCE
    }

    fn on_event(&self, event: &LifecycleEvent) -> Result<()> {
        match event {
            LifecycleEvent::OutboundStarted { scope: Some(scope) } => self.on_start(scope),
            LifecycleEvent::OutboundFailed {
                scope: Some(scope),
                fault: Some(fault),
            } => self.on_failed(scope, fault),
            LifecycleEvent::OutboundCompleted {
                scope: Some(scope),
                status,
                response_headers,
                outcome,
            } => self.on_completed(scope, *status, response_headers.as_ref(), *outcome),
            LifecycleEvent::OutboundStarted { .. }
            | LifecycleEvent::OutboundFailed { .. }
            | LifecycleEvent::OutboundCompleted { .. } => {
                tracing::debug!(event = event.name(), "Event payload incomplete, skipping");
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::{propagation, NoopTracer, RecordingTracer, TagValue};
    use axum::http::HeaderValue;

    fn outbound(headers: HeaderMap) -> Arc<OutboundScope> {
        Arc::new(OutboundScope::new("GET", "http://inventory/api/stock", headers))
    }

    #[test]
    fn test_injects_context_and_renames_from_server_route() {
        let tracer = Arc::new(RecordingTracer::new());
        let observer = OutboundRequestObserver::new(tracer.clone());
        let scope = outbound(HeaderMap::new());

        observer
            .on_event(&LifecycleEvent::OutboundStarted { scope: Some(scope.clone()) })
            .unwrap();
        let injected = scope.headers();
        assert!(propagation::extract(&injected).is_some());

        let mut response = HeaderMap::new();
        response.insert(SPAN_NAME_HEADER, HeaderValue::from_static("api/stock"));
        observer
            .on_event(&LifecycleEvent::OutboundCompleted {
                scope: Some(scope),
                status: Some(404),
                response_headers: Some(response),
                outcome: TaskOutcome::Completed,
            })
            .unwrap();

        let spans = tracer.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].operation_name, "GET-api/stock");
        assert_eq!(spans[0].tag(ERROR), Some(&TagValue::Bool(true)));
        assert_eq!(spans[0].tag(SPAN_KIND), Some(&TagValue::from(SPAN_KIND_CLIENT)));
    }

    #[test]
    fn test_ignore_header_skips_tracing() {
        let tracer = Arc::new(RecordingTracer::new());
        let observer = OutboundRequestObserver::new(tracer.clone());
        let mut headers = HeaderMap::new();
        headers.insert(IGNORE_HEADER, HeaderValue::from_static("true"));
        let scope = outbound(headers);

        observer
            .on_event(&LifecycleEvent::OutboundStarted { scope: Some(scope.clone()) })
            .unwrap();
        assert!(!scope.has_span());
    }

    #[test]
    fn test_noop_tracer_skips_span() {
        let observer = OutboundRequestObserver::new(Arc::new(NoopTracer));
        let scope = outbound(HeaderMap::new());
        observer
            .on_event(&LifecycleEvent::OutboundStarted { scope: Some(scope.clone()) })
            .unwrap();
        assert!(!scope.has_span());
        assert!(scope.headers().is_empty());
    }

    #[test]
    fn test_cancelled_call_is_error() {
        let tracer = Arc::new(RecordingTracer::new());
        let observer = OutboundRequestObserver::new(tracer.clone());
        let scope = outbound(HeaderMap::new());
        observer
            .on_event(&LifecycleEvent::OutboundStarted { scope: Some(scope.clone()) })
            .unwrap();
        observer
            .on_event(&LifecycleEvent::OutboundCompleted {
                scope: Some(scope),
                status: None,
                response_headers: None,
                outcome: TaskOutcome::Canceled,
            })
            .unwrap();

        let spans = tracer.finished_spans();
        assert_eq!(spans[0].operation_name, "GET");
        assert_eq!(spans[0].tag(ERROR), Some(&TagValue::Bool(true)));
    }
}
