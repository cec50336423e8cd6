//! Demo HTTP server.
//!
//! # Responsibilities
//! - Create the axum Router with the demo alert handlers
//! - Register every route with the route catalog for controller/action tags
//! - Wire up middleware (telemetry capture, tower-http tracing)
//! - Serve until the shutdown signal fires

use std::sync::Arc;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::host::{instrument, RouteCatalog};
use crate::instrumentation::Instrumentation;

use super::handlers::{self, AlertState, Relay};

const CONTROLLER: &str = "Alert";

/// Catalog entries for every demo route.
pub fn alert_catalog() -> RouteCatalog {
    RouteCatalog::new()
        .handler(Method::POST, "/api/v2/alert", CONTROLLER, "Create")
        .handler(Method::GET, "/api/v2/alert/summary", CONTROLLER, "Summary")
        .handler(Method::GET, "/api/v2/alert/{id}", CONTROLLER, "Get")
        .handler(Method::DELETE, "/api/v2/alert/{id}", CONTROLLER, "Delete")
        .handler(Method::GET, "/api/v2/alert/{id}/relay", CONTROLLER, "Relay")
        .handler(Method::GET, "/api/v2/alert/explode", CONTROLLER, "Explode")
}

/// Demo server instrumented with request telemetry.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// `upstream` enables the relay route.
    pub fn new(instrumentation: &Arc<Instrumentation>, upstream: Option<String>) -> Self {
        let relay = upstream.map(|base_url| Relay {
            client: instrumentation.client(reqwest::Client::new()),
            base_url,
        });
        let router = Self::build_router(instrumentation, AlertState::new(relay));
        Self { router }
    }

    pub fn build_router(instrumentation: &Instrumentation, state: AlertState) -> Router {
        let routes = Router::new()
            .route("/api/v2/alert", post(handlers::create_alert))
            .route("/api/v2/alert/summary", get(handlers::alert_summary))
            .route("/api/v2/alert/explode", get(handlers::explode))
            .route(
                "/api/v2/alert/{id}",
                get(handlers::get_alert).delete(handlers::delete_alert),
            )
            .route("/api/v2/alert/{id}/relay", get(handlers::relay_alert))
            .with_state(state);

        instrument(routes, instrumentation.host_state(alert_catalog()))
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
