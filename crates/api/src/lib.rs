//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - Report download routes (daily, weekly, monthly, custom)
//! - Health, index and runtime status routes
//! - JSON error responses mapped from [`AppError`](jxreport_shared::AppError)

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use jxreport_db::ReportRunner;

pub use error::ApiError;

/// Largest accepted request body. Report requests are a handful of fields.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Admission-bounded report executor.
    pub runner: Arc<dyn ReportRunner>,
}

impl AppState {
    /// Wraps a runner.
    pub fn new(runner: Arc<dyn ReportRunner>) -> Self {
        Self { runner }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
