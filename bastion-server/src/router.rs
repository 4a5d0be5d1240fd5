use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::proxy_router().layer(CorsLayer::permissive()))
        .nest("/admin", api::admin_router())
        .route("/health", get(api::health_check))
        .route("/healthz", get(api::health_check))
        .route("/metrics", get(api::get_metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
}
