//! Route definitions for serverless backend management.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::serverless;
use crate::state::AppState;

/// Routes mounted at `/api/v1/serverless`.
///
/// All routes require a permitted session (enforced by handler extractors).
///
/// ```text
/// POST /refresh-models   -> refresh_models
/// GET  /status           -> status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/refresh-models", post(serverless::refresh_models))
        .route("/status", get(serverless::status))
}
