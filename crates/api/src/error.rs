use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coldspark_serverless::error::ServerlessError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`ServerlessError`] for orchestration failures and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce
/// consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from the orchestration layer.
    #[error(transparent)]
    Serverless(#[from] ServerlessError),

    /// The request lacked a usable session.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Serverless(err) => classify_serverless_error(err),

            // --- HTTP-specific errors ---
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify an orchestration error into an HTTP status, error code, and message.
///
/// - `Configuration` maps to 400 (fixable by the caller or operator).
/// - `PermissionDenied` maps to 403.
/// - Exhausted startup, discovery, and job-polling budgets map to 504.
/// - Transport, protocol, and remote-failure errors map to 502.
/// - `Cancelled` maps to 500.
fn classify_serverless_error(err: &ServerlessError) -> (StatusCode, &'static str, String) {
    match err {
        ServerlessError::Configuration(msg) => {
            (StatusCode::BAD_REQUEST, "CONFIGURATION", msg.clone())
        }
        ServerlessError::PermissionDenied(msg) => {
            (StatusCode::FORBIDDEN, "PERMISSION_DENIED", msg.clone())
        }
        ServerlessError::WorkerStartupTimeout { .. }
        | ServerlessError::DiscoveryTimeout { .. }
        | ServerlessError::JobTimeout { .. } => (
            StatusCode::GATEWAY_TIMEOUT,
            "UPSTREAM_TIMEOUT",
            err.to_string(),
        ),
        ServerlessError::EmptyResult => {
            (StatusCode::BAD_GATEWAY, "EMPTY_RESULT", err.to_string())
        }
        ServerlessError::Request(_)
        | ServerlessError::Transport { .. }
        | ServerlessError::Malformed(_)
        | ServerlessError::JobFailed(_) => {
            tracing::error!(error = %err, "Upstream serverless failure");
            (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
        }
        ServerlessError::Cancelled => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "CANCELLED",
            err.to_string(),
        ),
    }
}
