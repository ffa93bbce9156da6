//! HTTP routing configuration.

use axum::{routing::get, Router};

use crate::http::handlers::{healthz, landing, metrics};
use crate::http::state::AppState;

/// Build the Axum router.
///
/// # Parameters
///
/// - `state` - Application state containing the scraper
///
/// # Returns
///
/// Returns the configured Axum `Router`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}
