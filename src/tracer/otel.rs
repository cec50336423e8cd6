//! Adapter from any OpenTelemetry tracer to [`Tracer`].

use axum::http::HeaderMap;
use opentelemetry::trace::{TraceContextExt, Tracer as _};
use opentelemetry::Context;

use super::{propagation, Span, SpanBuilder, SpanContext, Tracer};

/// Starts spans on an OpenTelemetry tracer and propagates W3C context.
///
/// Spans go wherever the tracer's provider sends them; nothing is kept here.
#[derive(Debug, Clone)]
pub struct OtelTracer<T> {
    tracer: T,
}

impl<T> OtelTracer<T> {
    pub fn new(tracer: T) -> Self {
        Self { tracer }
    }
}

impl<T> Tracer for OtelTracer<T>
where
    T: opentelemetry::trace::Tracer + Send + Sync,
    T::Span: Send + 'static,
{
    fn extract(&self, headers: &HeaderMap) -> Option<SpanContext> {
        propagation::extract(headers)
    }

    fn inject(&self, context: &SpanContext, headers: &mut HeaderMap) {
        propagation::inject(context, headers);
    }

    fn start_span(&self, builder: SpanBuilder) -> Box<dyn Span> {
        // An empty context makes a root span; ambient context is never used.
        let parent = match builder.parent {
            Some(remote) => Context::new().with_remote_span_context(remote),
            None => Context::new(),
        };
        let span = self
            .tracer
            .span_builder(builder.operation_name)
            .with_kind(builder.kind)
            .with_attributes(builder.tags)
            .start_with_context(&self.tracer, &parent);
        Box::new(span)
    }
}
