//! Administrative handlers for the dashboard: circuits, rate limits, sagas.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use bastion_types::{
    CircuitSnapshot, CircuitStats, LimiterStats, RateLimitInfo, SagaInstance, SagaStats,
};
use serde::Serialize;

use super::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub target: String,
}

pub async fn list_circuits(State(state): State<AppState>) -> Json<Vec<CircuitSnapshot>> {
    Json(state.gateway().get_all_circuits().await)
}

pub async fn circuit_stats(State(state): State<AppState>) -> Json<CircuitStats> {
    Json(state.gateway().get_circuit_stats().await)
}

pub async fn reset_circuit(
    State(state): State<AppState>,
    Path(dependency): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    state.gateway().reset_circuit(&dependency).await?;
    Ok(Json(ResetResponse { success: true, target: dependency }))
}

pub async fn limiter_stats(State(state): State<AppState>) -> Json<LimiterStats> {
    Json(state.gateway().get_limiter_stats())
}

pub async fn rate_limit_info(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<RateLimitInfo>, ApiError> {
    Ok(Json(state.gateway().get_rate_limit_info(&key).await?))
}

pub async fn reset_rate_limit(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    state.gateway().reset_limit(&key).await?;
    Ok(Json(ResetResponse { success: true, target: key }))
}

pub async fn list_active_sagas(State(state): State<AppState>) -> Json<Vec<SagaInstance>> {
    Json(state.gateway().get_active_sagas())
}

pub async fn saga_stats(State(state): State<AppState>) -> Json<SagaStats> {
    Json(state.gateway().get_saga_stats())
}

pub async fn get_saga(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SagaInstance>, (StatusCode, Json<serde_json::Value>)> {
    state.gateway().get_saga_status(&id).map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "success": false,
                "message": format!("Saga {id} not found"),
                "statusCode": 404,
            })),
        )
    })
}

