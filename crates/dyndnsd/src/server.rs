// # HTTP Surfaces
//
// Two independent routers, each bound to its own listener:
//
// ```text
// gateway ──GET /ip?username&password&v4&v6&prefix──▶ push router ──▶ PushListener
// monitor ──GET /healthz, /liveness ────────────────▶ health router ──▶ StatusBoard
// scraper ──GET /metrics ───────────────────────────▶ health router ──▶ Registry
// ```
//
// ## Push responses
//
// | Condition                                 | Status |
// |-------------------------------------------|--------|
// | Credentials do not match                  | 401    |
// | Only unparsable values supplied           | 400    |
// | Queue full (reject policy) or closed      | 503    |
// | Otherwise                                 | 200    |
//
// ## Health responses
//
// - `/healthz`: the status report as JSON, 200 when healthy, 503 otherwise
// - `/liveness`: 204 while the process serves requests
// - `/metrics`: the registry in the Prometheus text format
// - All three answer 401 when a token is configured and `?token=` does not match

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use dyndns_core::{Error, PushListener, PushReport, StatusBoard};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared state of the push router
#[derive(Clone)]
pub struct PushState {
    listener: PushListener,
    username: Arc<str>,
    password: Arc<str>,
}

impl PushState {
    pub fn new(listener: PushListener, username: &str, password: &str) -> Self {
        Self {
            listener,
            username: Arc::from(username),
            password: Arc::from(password),
        }
    }
}

/// Query string of a push request
#[derive(Debug, Default, Deserialize)]
struct PushQuery {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    v4: Option<String>,
    v6: Option<String>,
    prefix: Option<String>,
}

/// Router for the gateway's dynamic DNS pushes
pub fn push_router(state: PushState) -> Router {
    Router::new()
        .route("/ip", get(push_update))
        .with_state(state)
}

async fn push_update(State(state): State<PushState>, Query(query): Query<PushQuery>) -> StatusCode {
    if query.username != *state.username || query.password != *state.password {
        warn!(subsystem = "push_server", "Rejected push with invalid credentials");
        state.listener.record_rejected().await;
        return StatusCode::UNAUTHORIZED;
    }

    let report = PushReport {
        v4: query.v4,
        v6: query.v6,
        prefix: query.prefix,
    };

    match state.listener.handle(&report).await {
        Ok(outcome) if outcome.forwarded.is_empty() && !outcome.invalid.is_empty() => {
            StatusCode::BAD_REQUEST
        }
        Ok(outcome) => {
            debug!(
                subsystem = "push_server",
                forwarded = outcome.forwarded.len(),
                "Push accepted"
            );
            StatusCode::OK
        }
        Err(Error::QueueFull) | Err(Error::QueueClosed) => StatusCode::SERVICE_UNAVAILABLE,
        Err(e) => {
            warn!(subsystem = "push_server", error = %e, "Push failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Shared state of the health router
#[derive(Clone)]
pub struct HealthState {
    board: StatusBoard,
    registry: Registry,
    token: Option<Arc<str>>,
}

impl HealthState {
    pub fn new(board: StatusBoard, registry: Registry, token: Option<&str>) -> Self {
        Self {
            board,
            registry,
            token: token.map(Arc::from),
        }
    }

    fn authorized(&self, query: &TokenQuery) -> bool {
        match &self.token {
            None => true,
            Some(token) => query.token.as_deref() == Some(&**token),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Router for the health endpoints
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/liveness", get(liveness))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn healthz(State(state): State<HealthState>, Query(query): Query<TokenQuery>) -> Response {
    if !state.authorized(&query) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let report = state.board.report().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(report)).into_response()
}

async fn liveness(State(state): State<HealthState>, Query(query): Query<TokenQuery>) -> StatusCode {
    if state.authorized(&query) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn metrics(State(state): State<HealthState>, Query(query): Query<TokenQuery>) -> Response {
    if !state.authorized(&query) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&state.registry.gather(), &mut buffer) {
        warn!(subsystem = "metrics", error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    ([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response()
}
