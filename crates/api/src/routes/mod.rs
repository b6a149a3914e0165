pub mod health;
pub mod serverless;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /serverless/refresh-models   refresh every backend's catalog (POST)
/// /serverless/status           per-backend status snapshots (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Serverless backend management.
        .nest("/serverless", serverless::router())
}
