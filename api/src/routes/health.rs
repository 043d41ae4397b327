use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the store does not answer
    pub status: &'static str,
    pub database: bool,
    pub version: &'static str,
}

/// Liveness plus a store round-trip. Unauthenticated and never throttled.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "API and store reachable", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.store.ping().await;
    let (code, status) = if database {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    let body = HealthResponse {
        status,
        database,
        version: env!("CARGO_PKG_VERSION"),
    };
    (code, Json(body))
}
