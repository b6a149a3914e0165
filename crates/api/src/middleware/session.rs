//! Session header extractors for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use coldspark_serverless::error::ServerlessError;

use crate::error::AppError;
use crate::state::AppState;

/// Calling session extracted from the `X-Session-Id` header.
///
/// Use this as an extractor parameter in any handler that needs to know
/// who is calling:
///
/// ```ignore
/// async fn my_handler(SessionId(session): SessionId) -> AppResult<Json<()>> {
///     tracing::info!(%session, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

impl FromRequestParts<AppState> for SessionId {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .headers
            .get("x-session-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing X-Session-Id header".into()))?;

        Ok(SessionId(session.to_string()))
    }
}

/// Requires a session permitted to use serverless backends.
/// Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn serverless_only(
///     RequireServerless(SessionId(session)): RequireServerless,
/// ) -> AppResult<Json<()>> {
///     // session holds a permitted caller here
///     Ok(Json(()))
/// }
/// ```
pub struct RequireServerless(pub SessionId);

impl FromRequestParts<AppState> for RequireServerless {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = SessionId::from_request_parts(parts, state).await?;
        if !state.permissions.can_use_serverless(&session.0).await {
            return Err(AppError::Serverless(ServerlessError::PermissionDenied(
                "Session is not permitted to use serverless backends".into(),
            )));
        }
        Ok(RequireServerless(session))
    }
}
