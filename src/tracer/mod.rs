//! Distributed tracing support.
//!
//! # Responsibilities
//! - Define the tracer and span capabilities the observers consume
//! - Extract trace context from incoming requests
//! - Propagate trace context to outbound requests
//!
//! # Design Decisions
//! - Built on `opentelemetry`: span contexts, attribute values and spans are
//!   OpenTelemetry types, and any `opentelemetry::trace::Tracer` can sit
//!   behind [`OtelTracer`]
//! - Optional: a [`NoopTracer`] turns every span path off, and observers check
//!   [`Tracer::is_noop`] before doing any span work
//! - W3C Trace Context (`traceparent`) through `TraceContextPropagator`
//! - Span calls are infallible; a misbehaving tracer is contained by the
//!   dispatch boundary, not by the observers

pub mod noop;
pub mod otel;
pub mod propagation;
pub mod recording;

use axum::http::HeaderMap;
use opentelemetry::trace::Span as _;
pub use opentelemetry::KeyValue;

pub use noop::NoopTracer;
pub use opentelemetry::trace::{SpanContext, SpanId, SpanKind, TraceId};
pub use opentelemetry::Value as TagValue;
pub use otel::OtelTracer;
pub use recording::{FinishedSpan, RecordingTracer};

pub const SPAN_KIND: &str = "span.kind";
pub const SPAN_KIND_SERVER: &str = "server";
pub const SPAN_KIND_CLIENT: &str = "client";
pub const COMPONENT: &str = "component";
pub const HTTP_METHOD: &str = "http.method";
pub const HTTP_URL: &str = "http.url";
pub const HTTP_STATUS_CODE: &str = "http.status_code";
pub const HTTP_PATH: &str = "http.server.path";
pub const ERROR: &str = "error";

/// Name of the span events written by [`Span::log`].
pub const SPAN_LOG: &str = "log";

pub const LOG_EVENT: &str = "event";
pub const LOG_ERROR_KIND: &str = "error.kind";
pub const LOG_MESSAGE: &str = "message";

/// Parameters for a span about to start.
#[derive(Debug, Clone)]
pub struct SpanBuilder {
    pub operation_name: String,
    pub kind: SpanKind,
    pub parent: Option<SpanContext>,
    pub tags: Vec<KeyValue>,
}

impl SpanBuilder {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            kind: SpanKind::Internal,
            parent: None,
            tags: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn child_of(mut self, parent: Option<SpanContext>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_tag(mut self, key: &'static str, value: impl Into<TagValue>) -> Self {
        self.tags.push(KeyValue::new(key, value));
        self
    }
}

/// A started span.
pub trait Span: Send {
    fn context(&self) -> SpanContext;
    fn set_operation_name(&mut self, name: &str);
    fn set_tag(&mut self, key: &'static str, value: TagValue);
    fn log(&mut self, fields: Vec<KeyValue>);
    fn finish(self: Box<Self>);
}

impl<S> Span for S
where
    S: opentelemetry::trace::Span + Send + 'static,
{
    fn context(&self) -> SpanContext {
        self.span_context().clone()
    }

    fn set_operation_name(&mut self, name: &str) {
        self.update_name(name.to_string());
    }

    fn set_tag(&mut self, key: &'static str, value: TagValue) {
        self.set_attribute(KeyValue::new(key, value));
    }

    fn log(&mut self, fields: Vec<KeyValue>) {
        self.add_event(SPAN_LOG, fields);
    }

    fn finish(mut self: Box<Self>) {
        self.end();
    }
}

/// Tracer capability consumed by the observers.
pub trait Tracer: Send + Sync {
    /// A no-op tracer lets observers skip span work entirely.
    fn is_noop(&self) -> bool {
        false
    }

    fn extract(&self, headers: &HeaderMap) -> Option<SpanContext>;

    fn inject(&self, context: &SpanContext, headers: &mut HeaderMap);

    fn start_span(&self, builder: SpanBuilder) -> Box<dyn Span>;
}

/// Attach error details to a span as an event. The span stays open.
pub fn log_error(span: &mut dyn Span, kind: &str, message: &str) {
    span.log(vec![
        KeyValue::new(LOG_EVENT, ERROR),
        KeyValue::new(LOG_ERROR_KIND, kind.to_string()),
        KeyValue::new(LOG_MESSAGE, message.to_string()),
    ]);
}

/// Whether a status code is in the client/server error range.
pub fn is_error_status(status: u16) -> bool {
    (400..=599).contains(&status)
}

/// Span tag value for an HTTP status code.
pub fn status_tag(status: u16) -> TagValue {
    TagValue::I64(status.into())
}
