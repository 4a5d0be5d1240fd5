//! API Routes
//!
//! `/api/*` is the proxied surface; `/admin/*` is read and reset access for
//! the operations dashboard.

mod admin;
mod error;
mod proxy;

#[cfg(test)]
mod admin_tests;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{any, get, post},
    Router,
};
use serde::Serialize;

use crate::state::AppState;

pub fn proxy_router() -> Router<AppState> {
    Router::new()
        .route("/:prefix", any(proxy::proxy_request))
        .route("/:prefix/*rest", any(proxy::proxy_request))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        // Circuit breakers
        .route("/circuits", get(admin::list_circuits))
        .route("/circuits/stats", get(admin::circuit_stats))
        .route("/circuits/:dependency/reset", post(admin::reset_circuit))
        // Rate limits
        .route("/rate-limits/stats", get(admin::limiter_stats))
        .route(
            "/rate-limits/:key",
            get(admin::rate_limit_info).delete(admin::reset_rate_limit),
        )
        // Sagas
        .route("/sagas", get(admin::list_active_sagas))
        .route("/sagas/stats", get(admin::saga_stats))
        .route("/sagas/:id", get(admin::get_saga))
        .fallback(api_not_found)
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"})))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub pending_replies: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.uptime_secs(),
        pending_replies: state.gateway().correlator().pending_count(),
    })
}

pub async fn get_metrics() -> impl IntoResponse {
    let metrics = bastion_core::prometheus::render_metrics();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], metrics)
}
