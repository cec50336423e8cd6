//! Per-request state carried between lifecycle events.

use std::sync::{Mutex, MutexGuard, PoisonError};

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use crate::events::Fault;
use crate::gauge::InflightGuard;
use crate::naming::MetricName;
use crate::tags::TierTags;
use crate::tracer::Span;

/// Route details resolved at action selection.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub template: Option<String>,
    pub controller: Option<String>,
    pub action: Option<String>,
    pub metric_name: Option<MetricName>,
    pub tier_tags: Option<TierTags>,
}

/// Mutable state for one request. Never shared across requests.
#[derive(Default)]
pub struct RequestContext {
    pub start_ms: Option<u64>,
    pub exception: Option<Fault>,
    pub span: Option<Box<dyn Span>>,
    pub route: Option<ResolvedRoute>,
    pub inflight: Option<InflightGuard>,
    pub finalized: bool,
}

/// Handle the host creates for each inbound request.
///
/// Holds the request data observers read and the [`RequestContext`] they
/// write. The context lock is only held to move fields in or out.
pub struct RequestScope {
    request_id: Uuid,
    method: String,
    display_url: String,
    headers: HeaderMap,
    response_headers: Mutex<HeaderMap>,
    context: Mutex<RequestContext>,
}

impl RequestScope {
    pub fn new(method: impl Into<String>, display_url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            method: method.into(),
            display_url: display_url.into(),
            headers,
            response_headers: Mutex::new(HeaderMap::new()),
            context: Mutex::new(RequestContext::default()),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn display_url(&self) -> &str {
        &self.display_url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Run `f` with exclusive access to the request context.
    pub fn with_context<R>(&self, f: impl FnOnce(&mut RequestContext) -> R) -> R {
        let mut ctx = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut ctx)
    }

    pub fn set_response_header(&self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.response_headers().insert(name, value);
            }
            _ => tracing::debug!(
                request_id = %self.request_id,
                header = %name,
                "Response header not representable, skipping"
            ),
        }
    }

    pub fn response_header(&self, name: &str) -> Option<String> {
        self.response_headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Move the accumulated response headers out of the scope.
    pub fn take_response_headers(&self) -> HeaderMap {
        std::mem::take(&mut *self.response_headers())
    }

    fn response_headers(&self) -> MutexGuard<'_, HeaderMap> {
        self.response_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("display_url", &self.display_url)
            .finish_non_exhaustive()
    }
}

/// Handle for one outbound HTTP call.
pub struct OutboundScope {
    method: String,
    url: String,
    headers: Mutex<HeaderMap>,
    span: Mutex<Option<Box<dyn Span>>>,
}

impl OutboundScope {
    pub fn new(method: impl Into<String>, url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Mutex::new(headers),
            span: Mutex::new(None),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run `f` against the outgoing request headers.
    pub fn with_headers<R>(&self, f: impl FnOnce(&mut HeaderMap) -> R) -> R {
        let mut headers = self.headers.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut headers)
    }

    /// Snapshot of the outgoing headers, including anything observers injected.
    pub fn headers(&self) -> HeaderMap {
        self.with_headers(|h| h.clone())
    }

    pub fn store_span(&self, span: Box<dyn Span>) {
        *self.span.lock().unwrap_or_else(PoisonError::into_inner) = Some(span);
    }

    pub fn take_span(&self) -> Option<Box<dyn Span>> {
        self.span.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn has_span(&self) -> bool {
        self.span
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl std::fmt::Debug for OutboundScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundScope")
            .field("method", &self.method)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
