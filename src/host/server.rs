//! axum middleware that turns requests into lifecycle events.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{header, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::FutureExt;

use crate::events::source::panic_message;
use crate::events::{EventSource, Fault, LifecycleEvent};
use crate::observer::RequestScope;

use super::RouteCatalog;

const PANIC_FAULT_KIND: &str = "panic";

/// Shared state for the telemetry middleware.
#[derive(Clone)]
pub struct HostState {
    source: Arc<EventSource>,
    catalog: Arc<RouteCatalog>,
}

impl HostState {
    pub fn new(source: Arc<EventSource>, catalog: RouteCatalog) -> Self {
        Self {
            source,
            catalog: Arc::new(catalog),
        }
    }
}

/// Response extension a handler attaches to report a handled error.
///
/// The fault is reported as an unhandled exception, so the request is
/// recorded as a 500 regardless of the response status.
#[derive(Debug, Clone)]
pub struct HandlerFault(pub Fault);

impl HandlerFault {
    /// A response with the given status carrying the fault.
    pub fn response(status: StatusCode, fault: Fault) -> Response {
        let mut response = (status, fault.message.clone()).into_response();
        response.extensions_mut().insert(HandlerFault(fault));
        response
    }
}

/// Add the telemetry middleware pair to a router.
///
/// Call after every route has been added: the route-selection middleware is
/// a route layer and only wraps routes that exist at this point.
pub fn instrument<S>(router: Router<S>, host: HostState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .route_layer(middleware::from_fn_with_state(host.clone(), select_route))
        .layer(middleware::from_fn_with_state(host, track_request))
}

/// Outer middleware: start, exception and completion events.
pub async fn track_request(
    State(host): State<HostState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if !host.source.is_enabled() {
        return next.run(req).await;
    }

    let scope = Arc::new(RequestScope::new(
        req.method().as_str(),
        display_url(&req),
        req.headers().clone(),
    ));
    req.extensions_mut().insert(scope.clone());
    host.source.emit(&LifecycleEvent::started(&scope));

    let mut response = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => {
            if let Some(HandlerFault(fault)) = response.extensions().get::<HandlerFault>() {
                host.source
                    .emit(&LifecycleEvent::exception(&scope, fault.clone()));
            }
            response
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(
                request_id = %scope.request_id(),
                panic = %message,
                "Handler panicked"
            );
            host.source
                .emit(&LifecycleEvent::exception(&scope, Fault::new(PANIC_FAULT_KIND, message)));
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };

    host.source
        .emit(&LifecycleEvent::completed(&scope, response.status().as_u16()));
    response.headers_mut().extend(scope.take_response_headers());
    response
}

/// Route middleware: resolves the matched route and emits action selection.
pub async fn select_route(State(host): State<HostState>, req: Request<Body>, next: Next) -> Response {
    let scope = req.extensions().get::<Arc<RequestScope>>().cloned();
    let matched = req.extensions().get::<MatchedPath>();
    if let (Some(scope), Some(matched)) = (scope, matched) {
        let route = host.catalog.resolve(req.method(), matched.as_str());
        host.source.emit(&LifecycleEvent::action_selected(&scope, route));
    }
    next.run(req).await
}

fn display_url(req: &Request<Body>) -> String {
    let uri = req.uri();
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    match req.headers().get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{host}{path}"),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_url_uses_host_header() {
        let req = Request::builder()
            .uri("/api/items?page=2")
            .header(header::HOST, "shop.local")
            .body(Body::empty())
            .unwrap();
        assert_eq!(display_url(&req), "http://shop.local/api/items?page=2");

        let bare = Request::builder().uri("/x").body(Body::empty()).unwrap();
        assert_eq!(display_url(&bare), "/x");
    }

    #[test]
    fn test_handler_fault_response() {
        let response = HandlerFault::response(StatusCode::BAD_GATEWAY, Fault::new("Upstream", "down"));
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.extensions().get::<HandlerFault>().is_some());
    }
}
