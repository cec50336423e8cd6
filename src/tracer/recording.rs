//! In-process tracer that keeps finished spans for inspection.
//!
//! A test double: an SDK tracer provider exporting into an
//! `InMemorySpanExporter`, so spans flow through the same OpenTelemetry
//! pipeline as production. Nothing is ever evicted; never install it in a
//! long-running process.

use std::time::Duration;

use axum::http::HeaderMap;
use opentelemetry::trace::{SpanId, SpanKind, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::{self as sdktrace, TracerProvider};

use super::{OtelTracer, Span, SpanBuilder, SpanContext, TagValue, Tracer};

const TRACER_NAME: &str = "request-telemetry-test";

/// A span that has been finished.
#[derive(Debug, Clone)]
pub struct FinishedSpan {
    pub operation_name: String,
    pub kind: SpanKind,
    pub context: SpanContext,
    /// Span id of the parent, local or remote. Same trace as `context`.
    pub parent_span_id: Option<SpanId>,
    pub tags: Vec<KeyValue>,
    /// Attributes of each span event, in order.
    pub logs: Vec<Vec<KeyValue>>,
    pub duration: Duration,
}

impl FinishedSpan {
    /// Latest value set for `key`.
    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags
            .iter()
            .rev()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }
}

#[derive(Clone)]
pub struct RecordingTracer {
    tracer: OtelTracer<sdktrace::Tracer>,
    exporter: InMemorySpanExporter,
    // Dropping the last provider handle shuts the pipeline down.
    _provider: TracerProvider,
}

impl RecordingTracer {
    pub fn new() -> Self {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        Self {
            tracer: OtelTracer::new(provider.tracer(TRACER_NAME)),
            exporter,
            _provider: provider,
        }
    }

    /// Snapshot of finished spans, in finish order.
    pub fn finished_spans(&self) -> Vec<FinishedSpan> {
        let spans = self.exporter.get_finished_spans().unwrap_or_default();
        spans
            .into_iter()
            .map(|data| FinishedSpan {
                operation_name: data.name.to_string(),
                kind: data.span_kind,
                parent_span_id: (data.parent_span_id != SpanId::INVALID)
                    .then_some(data.parent_span_id),
                context: data.span_context,
                tags: data.attributes,
                logs: data
                    .events
                    .events
                    .into_iter()
                    .map(|event| event.attributes)
                    .collect(),
                duration: data
                    .end_time
                    .duration_since(data.start_time)
                    .unwrap_or_default(),
            })
            .collect()
    }

    pub fn clear(&self) {
        self.exporter.reset();
    }
}

impl Default for RecordingTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for RecordingTracer {
    fn extract(&self, headers: &HeaderMap) -> Option<SpanContext> {
        self.tracer.extract(headers)
    }

    fn inject(&self, context: &SpanContext, headers: &mut HeaderMap) {
        self.tracer.inject(context, headers);
    }

    fn start_span(&self, builder: SpanBuilder) -> Box<dyn Span> {
        self.tracer.start_span(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::{log_error, propagation, ERROR, SPAN_KIND};

    #[test]
    fn test_child_span_shares_trace() {
        let tracer = RecordingTracer::new();
        let root = tracer.start_span(SpanBuilder::new("upstream"));
        let parent = root.context();
        root.finish();
        tracer.clear();

        let mut span = tracer.start_span(
            SpanBuilder::new("GET /items")
                .with_kind(SpanKind::Server)
                .child_of(Some(parent.clone()))
                .with_tag(SPAN_KIND, "server"),
        );
        span.set_tag(ERROR, true.into());
        log_error(span.as_mut(), "Timeout", "upstream slow");
        span.finish();

        let spans = tracer.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].context.trace_id(), parent.trace_id());
        assert_ne!(spans[0].context.span_id(), parent.span_id());
        assert_eq!(spans[0].parent_span_id, Some(parent.span_id()));
        assert_eq!(spans[0].kind, SpanKind::Server);
        assert_eq!(spans[0].tag(ERROR), Some(&TagValue::Bool(true)));
        assert_eq!(spans[0].logs.len(), 1);
    }

    #[test]
    fn test_rename_before_finish() {
        let tracer = RecordingTracer::new();
        let mut span = tracer.start_span(SpanBuilder::new("initial"));
        span.set_operation_name("renamed");
        span.finish();
        let spans = tracer.finished_spans();
        assert_eq!(spans[0].operation_name, "renamed");
        assert_eq!(spans[0].parent_span_id, None);
    }

    #[test]
    fn test_injected_context_round_trips_through_headers() {
        let tracer = RecordingTracer::new();
        let span = tracer.start_span(SpanBuilder::new("GET"));
        let mut headers = HeaderMap::new();
        tracer.inject(&span.context(), &mut headers);

        let extracted = propagation::extract(&headers).unwrap();
        assert_eq!(extracted.trace_id(), span.context().trace_id());
        assert_eq!(extracted.span_id(), span.context().span_id());
        span.finish();
    }
}
