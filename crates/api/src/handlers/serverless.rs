//! Handlers for serverless backend management.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use coldspark_core::status::{BackendSnapshot, RefreshSummary};

use crate::error::AppResult;
use crate::middleware::session::{RequireServerless, SessionId};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response payload for the status endpoint.
#[derive(Serialize)]
pub struct StatusResponse {
    /// Per-backend snapshots, ordered by backend id.
    pub backends: Vec<BackendSnapshot>,
    /// Total number of registered backends.
    pub total_backends: usize,
}

/// POST /api/v1/serverless/refresh-models -- refresh every backend's catalog.
///
/// Wakes each backend's worker, re-discovers its models, and commits
/// the new catalogs. Responds once every backend has been attempted,
/// with counts of how many succeeded and failed.
pub async fn refresh_models(
    RequireServerless(SessionId(session)): RequireServerless,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<RefreshSummary>>> {
    let summary = state
        .registry
        .refresh_all(Some(session.as_str()), &state.shutdown)
        .await?;

    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/serverless/status -- status snapshot of every backend.
pub async fn status(
    _session: RequireServerless,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<StatusResponse>>> {
    let backends = state.registry.snapshots().await;
    let total_backends = backends.len();

    Ok(Json(DataResponse {
        data: StatusResponse {
            backends,
            total_backends,
        },
    }))
}
