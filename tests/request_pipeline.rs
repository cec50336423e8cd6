//! Inbound requests through the axum middleware into metrics and spans.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Method, Request, StatusCode},
    routing,
    Router,
};
use futures_util::future::join_all;
use tokio::sync::Barrier;
use tower::ServiceExt;

use request_telemetry::gauge::{GaugeKey, GaugeRegistry};

use request_telemetry::events::LifecycleEvent;
use request_telemetry::host::{instrument, RouteCatalog};
use request_telemetry::http::{handlers::AlertState, HttpServer};
use request_telemetry::observer::{RequestScope, SPAN_NAME_HEADER};
use request_telemetry::tags::{AGGREGATED_SOURCE, SHARD_TAG_KEY, SOURCE_TAG_KEY};
use request_telemetry::tracer::{status_tag, TagValue, ERROR, HTTP_STATUS_CODE};
use request_telemetry::ApplicationIdentity;

mod common;
use common::{shop_cart, Harness, SOURCE};

const ALERT_ROUTE: &str = "/api/v2/alert/{id}";

fn alert_catalog() -> RouteCatalog {
    RouteCatalog::new().handler(Method::GET, ALERT_ROUTE, "Alert", "Get")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, "shop.local")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_successful_request_records_metrics_and_gauge() {
    let h = Harness::new(shop_cart().with_cluster("us-west").with_shard("primary"));
    let inflight_key = h.total_inflight_key();
    let seen_inflight = Arc::new(Mutex::new(None));

    let clock = h.clock.clone();
    let sink = h.sink.clone();
    let key = inflight_key.clone();
    let seen = seen_inflight.clone();
    let routes = Router::new().route(
        ALERT_ROUTE,
        routing::get(move || {
            let clock = clock.clone();
            let sink = sink.clone();
            let key = key.clone();
            let seen = seen.clone();
            async move {
                *seen.lock().unwrap() = sink.gauge_value(&key);
                clock.advance(42);
                "ok"
            }
        }),
    );
    let app = instrument(routes, h.instrumentation.host_state(alert_catalog()));

    assert_eq!(h.sink.gauge_value(&inflight_key), None);
    let response = app.oneshot(get("/api/v2/alert/7")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(SPAN_NAME_HEADER)
            .and_then(|v| v.to_str().ok()),
        Some(ALERT_ROUTE)
    );
    assert_eq!(*seen_inflight.lock().unwrap(), Some(1.0));
    assert_eq!(h.sink.gauge_value(&inflight_key), Some(0.0));

    assert_eq!(
        h.sink
            .counter_total("http.server.response.api.v2.alert._id_.GET.200.cumulative"),
        1
    );
    assert_eq!(
        h.sink
            .histogram_values("http.server.response.api.v2.alert._id_.GET.200.latency"),
        vec![42.0]
    );
    assert_eq!(
        h.sink
            .counter_total("http.server.response.api.v2.alert._id_.GET.200.total_time"),
        42
    );

    let per_source = h
        .sink
        .counter_tags("http.server.response.completed.aggregated_per_source");
    assert_eq!(per_source.len(), 1);
    assert_eq!(per_source[0].get(SOURCE_TAG_KEY), Some(SOURCE));
    let per_shard = h
        .sink
        .counter_tags("http.server.response.completed.aggregated_per_shard");
    assert_eq!(per_shard[0].get(SOURCE_TAG_KEY), Some(AGGREGATED_SOURCE));

    let spans = h.tracer.finished_spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].operation_name, "Alert.Get");
    assert_eq!(spans[0].tag(HTTP_STATUS_CODE), Some(&status_tag(200)));
    assert_eq!(spans[0].tag(ERROR), None);
}

#[tokio::test]
async fn test_server_error_counts_errors() {
    let h = Harness::new(shop_cart());
    let routes = Router::new().route(
        ALERT_ROUTE,
        routing::get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let app = instrument(routes, h.instrumentation.host_state(alert_catalog()));

    let response = app.oneshot(get("/api/v2/alert/7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    assert_eq!(
        h.sink
            .counter_total("http.server.response.api.v2.alert._id_.GET.503.cumulative"),
        1
    );
    assert_eq!(
        h.sink
            .counter_total("http.server.response.api.v2.alert._id_.GET.errors"),
        1
    );
    assert_eq!(h.sink.counter_total("http.server.response.errors"), 1);
    assert_eq!(
        h.sink
            .counter_total("http.server.response.errors.aggregated_per_source"),
        1
    );

    let spans = h.tracer.finished_spans();
    assert_eq!(spans[0].tag(ERROR), Some(&TagValue::Bool(true)));
}

#[tokio::test]
async fn test_shard_without_cluster_skips_cluster_rollups() {
    let h = Harness::new(ApplicationIdentity::new("shop", "cart").with_shard("primary"));
    let routes = Router::new().route(ALERT_ROUTE, routing::get(|| async { "ok" }));
    let app = instrument(routes, h.instrumentation.host_state(alert_catalog()));

    app.oneshot(get("/api/v2/alert/7")).await.unwrap();

    let names = h.sink.counter_names();
    assert!(names
        .iter()
        .any(|n| n == "http.server.response.api.v2.alert._id_.GET.200.aggregated_per_shard"));
    assert!(names
        .iter()
        .any(|n| n == "http.server.response.completed.aggregated_per_shard"));
    assert!(!names.iter().any(|n| n.ends_with("aggregated_per_cluster")));

    let per_shard = h
        .sink
        .counter_tags("http.server.response.completed.aggregated_per_shard");
    assert_eq!(per_shard[0].get(SHARD_TAG_KEY), Some("primary"));
}

#[tokio::test]
async fn test_duplicate_completion_is_counted_once() {
    let h = Harness::new(shop_cart());
    let source = h.instrumentation.server_source();
    let scope = Arc::new(RequestScope::new(
        "GET",
        "http://shop.local/api/v2/alert/7",
        Default::default(),
    ));

    source.emit(&LifecycleEvent::started(&scope));
    source.emit(&LifecycleEvent::action_selected(
        &scope,
        alert_catalog().resolve(&Method::GET, ALERT_ROUTE),
    ));
    h.clock.advance(5);
    source.emit(&LifecycleEvent::completed(&scope, 200));
    source.emit(&LifecycleEvent::completed(&scope, 200));

    assert_eq!(
        h.sink
            .counter_total("http.server.response.api.v2.alert._id_.GET.200.cumulative"),
        1
    );
    assert_eq!(h.tracer.finished_spans().len(), 1);
    assert_eq!(h.sink.gauge_value(&h.total_inflight_key()), Some(0.0));
}

#[tokio::test]
async fn test_unmatched_path_emits_no_route_metrics() {
    let h = Harness::new(shop_cart());
    let routes = Router::new().route(ALERT_ROUTE, routing::get(|| async { "ok" }));
    let app = instrument(routes, h.instrumentation.host_state(alert_catalog()));

    let total = h.total_inflight_key();

    let response = app.clone().oneshot(get("/nowhere")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(h.sink.counter_names().is_empty());
    assert_eq!(h.tracer.finished_spans().len(), 1);
    assert_eq!(h.instrumentation.gauges().value(&total), None);

    app.clone().oneshot(get("/api/v2/alert/7")).await.unwrap();
    app.oneshot(get("/nowhere")).await.unwrap();
    assert_eq!(h.instrumentation.gauges().value(&total), Some(0));
    assert_eq!(h.sink.gauge_value(&total), Some(0.0));
}

const BOOM_ROUTE: &str = "/api/v2/alert/{id}/boom";
const CONCURRENT_REQUESTS: usize = 64;

/// Holds every handler until all requests are in flight.
struct Rendezvous {
    arrived: Barrier,
    release: Barrier,
    gauges: Arc<GaugeRegistry>,
    total: GaugeKey,
    peak: AtomicI64,
}

impl Rendezvous {
    async fn meet(&self) {
        if self.arrived.wait().await.is_leader() {
            let inflight = self.gauges.value(&self.total).unwrap_or(0);
            self.peak.store(inflight, Ordering::SeqCst);
        }
        self.release.wait().await;
    }
}

async fn flaky(State(r): State<Arc<Rendezvous>>, Path(id): Path<u32>) -> StatusCode {
    r.meet().await;
    if id % 2 == 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn boom(State(r): State<Arc<Rendezvous>>, Path(id): Path<u32>) -> StatusCode {
    r.meet().await;
    panic!("alert {id} exploded");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_release_every_gauge() {
    let h = Harness::new(shop_cart());
    let total = h.total_inflight_key();
    let get_key = h.route_inflight_key(ALERT_ROUTE, "Alert", "Get");
    let boom_key = h.route_inflight_key(BOOM_ROUTE, "Alert", "Boom");

    let rendezvous = Arc::new(Rendezvous {
        arrived: Barrier::new(CONCURRENT_REQUESTS),
        release: Barrier::new(CONCURRENT_REQUESTS),
        gauges: h.instrumentation.gauges().clone(),
        total: total.clone(),
        peak: AtomicI64::new(0),
    });
    let routes = Router::new()
        .route(ALERT_ROUTE, routing::get(flaky))
        .route(BOOM_ROUTE, routing::get(boom))
        .with_state(rendezvous.clone());
    let catalog = alert_catalog().handler(Method::GET, BOOM_ROUTE, "Alert", "Boom");
    let app = instrument(routes, h.instrumentation.host_state(catalog));

    let tasks: Vec<_> = (0..CONCURRENT_REQUESTS)
        .map(|i| {
            let app = app.clone();
            let uri = if i % 4 == 3 {
                format!("/api/v2/alert/{i}/boom")
            } else {
                format!("/api/v2/alert/{i}")
            };
            tokio::spawn(async move { app.oneshot(get(&uri)).await.unwrap().status() })
        })
        .collect();
    let statuses: Vec<StatusCode> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let count = |status: StatusCode| statuses.iter().filter(|s| **s == status).count();
    assert_eq!(count(StatusCode::OK), 32);
    assert_eq!(count(StatusCode::SERVICE_UNAVAILABLE), 16);
    assert_eq!(count(StatusCode::INTERNAL_SERVER_ERROR), 16);

    assert_eq!(rendezvous.peak.load(Ordering::SeqCst), CONCURRENT_REQUESTS as i64);
    let gauges = h.instrumentation.gauges();
    assert_eq!(gauges.value(&total), Some(0));
    assert_eq!(gauges.value(&get_key), Some(0));
    assert_eq!(gauges.value(&boom_key), Some(0));

    assert_eq!(
        h.sink
            .counter_total("http.server.response.api.v2.alert._id_.GET.200.cumulative"),
        32
    );
    assert_eq!(
        h.sink
            .counter_total("http.server.response.api.v2.alert._id_.boom.GET.500.cumulative"),
        16
    );
    assert_eq!(h.tracer.finished_spans().len(), CONCURRENT_REQUESTS);
}

#[tokio::test]
async fn test_stopped_pipeline_is_transparent() {
    let h = Harness::new(shop_cart());
    h.instrumentation.stop();
    let routes = Router::new().route(ALERT_ROUTE, routing::get(|| async { "ok" }));
    let app = instrument(routes, h.instrumentation.host_state(alert_catalog()));

    let response = app.oneshot(get("/api/v2/alert/7")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SPAN_NAME_HEADER).is_none());
    assert!(h.sink.counter_names().is_empty());
}

#[tokio::test]
async fn test_demo_panic_is_answered_with_500() {
    let h = Harness::new(shop_cart());
    let app = HttpServer::build_router(&h.instrumentation, AlertState::new(None));

    let response = app.oneshot(get("/api/v2/alert/explode")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        h.sink
            .counter_total("http.server.response.api.v2.alert.explode.GET.500.cumulative"),
        1
    );
    let spans = h.tracer.finished_spans();
    assert_eq!(spans[0].operation_name, "Alert.Explode");
    assert_eq!(spans[0].logs.len(), 1);
}

#[tokio::test]
async fn test_demo_handler_fault_is_recorded_as_500() {
    let h = Harness::new(shop_cart());
    let app = HttpServer::build_router(&h.instrumentation, AlertState::new(None));

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/v2/alert/99")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        h.sink
            .counter_total("http.server.response.api.v2.alert._id_.DELETE.500.cumulative"),
        1
    );
    assert_eq!(
        h.tracer.finished_spans()[0].tag(HTTP_STATUS_CODE),
        Some(&status_tag(500))
    );
}

#[tokio::test]
async fn test_demo_create_then_summary() {
    let h = Harness::new(shop_cart());
    let app = HttpServer::build_router(&h.instrumentation, AlertState::new(None));

    let create = Request::builder()
        .method(Method::POST)
        .uri("/api/v2/alert")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"disk full","severity":"critical"}"#))
        .unwrap();
    let response = app.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.oneshot(get("/api/v2/alert/summary")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], br#"{"total":1,"critical":1}"#);

    assert_eq!(
        h.sink
            .counter_total("http.server.response.api.v2.alert.POST.201.cumulative"),
        1
    );
    assert_eq!(
        h.sink
            .counter_total("http.server.response.api.v2.alert.summary.GET.200.cumulative"),
        1
    );
}
