//! Health, index and runtime status endpoints.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use jxreport_db::RuntimeStatus;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
}

/// Service index response.
#[derive(Serialize)]
pub struct IndexResponse {
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Available endpoints as `METHOD path`.
    pub endpoints: &'static [&'static str],
}

const ENDPOINTS: &[&str] = &[
    "GET /health",
    "GET /api/status",
    "POST /api/report/daily",
    "POST /api/report/weekly",
    "POST /api/report/monthly",
    "POST /api/report/custom",
];

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        service: "jxreport",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS,
    })
}

/// Admission and pool occupancy.
async fn runtime_status(State(state): State<AppState>) -> Json<RuntimeStatus> {
    Json(state.runner.status())
}

/// Creates health, index and status routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/status", get(runtime_status))
}
