//! Tracer that records nothing.

use axum::http::HeaderMap;
use opentelemetry::trace::{noop, Tracer as _};

use super::{Span, SpanBuilder, SpanContext, Tracer};

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn is_noop(&self) -> bool {
        true
    }

    fn extract(&self, _headers: &HeaderMap) -> Option<SpanContext> {
        None
    }

    fn inject(&self, _context: &SpanContext, _headers: &mut HeaderMap) {}

    fn start_span(&self, builder: SpanBuilder) -> Box<dyn Span> {
        Box::new(noop::NoopTracer::new().start(builder.operation_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_span_has_no_valid_context() {
        let tracer = NoopTracer;
        assert!(tracer.is_noop());

        let span = tracer.start_span(SpanBuilder::new("GET"));
        assert!(!span.context().is_valid());
        span.finish();

        let mut headers = HeaderMap::new();
        tracer.inject(&SpanContext::empty_context(), &mut headers);
        assert!(headers.is_empty());
    }
}
