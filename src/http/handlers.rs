//! Demo alert API served under telemetry.
//!
//! A small in-memory resource that exercises every capture path: plain
//! success, client errors, handled faults, panics and outbound calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::events::Fault;
use crate::host::{HandlerFault, InstrumentedClient};

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: u64,
    pub name: String,
    pub severity: String,
}

#[derive(Debug, Deserialize)]
pub struct NewAlert {
    pub name: String,
    #[serde(default = "default_severity")]
    pub severity: String,
}

fn default_severity() -> String {
    "warn".to_string()
}

#[derive(Debug, Serialize)]
pub struct AlertSummary {
    pub total: usize,
    pub critical: usize,
}

/// Outbound target for the relay route.
#[derive(Clone)]
pub struct Relay {
    pub client: InstrumentedClient,
    pub base_url: String,
}

/// State shared by the demo handlers.
#[derive(Clone, Default)]
pub struct AlertState {
    alerts: Arc<DashMap<u64, Alert>>,
    next_id: Arc<AtomicU64>,
    relay: Option<Relay>,
}

impl AlertState {
    pub fn new(relay: Option<Relay>) -> Self {
        Self {
            relay,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

pub async fn create_alert(State(state): State<AlertState>, Json(body): Json<NewAlert>) -> Response {
    if body.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "alert name must not be empty").into_response();
    }
    let id = state.next_id.fetch_add(1, Ordering::Relaxed) + 1;
    let alert = Alert {
        id,
        name: body.name,
        severity: body.severity,
    };
    state.alerts.insert(id, alert.clone());
    tracing::debug!(alert_id = id, "Alert created");
    (StatusCode::CREATED, Json(alert)).into_response()
}

pub async fn get_alert(State(state): State<AlertState>, Path(id): Path<u64>) -> Response {
    match state.alerts.get(&id) {
        Some(alert) => Json(alert.value().clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn alert_summary(State(state): State<AlertState>) -> Json<AlertSummary> {
    let critical = state
        .alerts
        .iter()
        .filter(|a| a.severity == "critical")
        .count();
    Json(AlertSummary {
        total: state.alerts.len(),
        critical,
    })
}

/// Removing an unknown alert is reported as a handled fault.
pub async fn delete_alert(State(state): State<AlertState>, Path(id): Path<u64>) -> Response {
    match state.alerts.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => HandlerFault::response(
            StatusCode::CONFLICT,
            Fault::new("AlertNotFound", format!("alert {id} does not exist")),
        ),
    }
}

/// Always panics; the middleware answers 500.
pub async fn explode() -> Response {
    panic!("alert store corrupted")
}

/// Forward the lookup to the configured upstream.
pub async fn relay_alert(State(state): State<AlertState>, Path(id): Path<u64>) -> Response {
    let Some(relay) = state.relay else {
        return (StatusCode::SERVICE_UNAVAILABLE, "no upstream configured").into_response();
    };
    let url = format!("{}/api/v2/alert/{id}", relay.base_url.trim_end_matches('/'));
    match relay.client.send(relay.client.get(&url)).await {
        Ok(upstream) => {
            let status =
                StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            match upstream.text().await {
                Ok(body) => (status, body).into_response(),
                Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
            }
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Relay failed");
            (StatusCode::BAD_GATEWAY, "upstream request failed").into_response()
        }
    }
}
