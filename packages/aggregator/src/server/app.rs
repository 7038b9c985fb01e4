//! Application setup and server configuration.

use std::sync::Arc;

use axum::extract::Extension;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::domains::jobs::readiness::JobServiceHandle;
use crate::kernel::BaseJobStore;
use crate::server::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BaseJobStore>,
    /// Resolved per request so callers always see the current readiness
    /// snapshot, never a captured pre-readiness stub
    pub job_service: JobServiceHandle,
    pub config: Arc<Config>,
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health_handler))
        .route("/healthz", get(routes::healthz_handler))
        .route("/health/db", get(routes::health_db_handler))
        .route("/fetch", post(routes::trigger_fetch_handler))
        .route("/score", post(routes::trigger_score_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
