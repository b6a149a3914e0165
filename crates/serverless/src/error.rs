//! Error taxonomy for the serverless orchestration layer.

/// Errors from serverless worker orchestration.
///
/// Transient per-attempt failures inside polling and fan-out loops are
/// swallowed and logged where they occur; only budget exhaustion or a
/// definitive remote failure surfaces as one of these variants.
#[derive(Debug, thiserror::Error)]
pub enum ServerlessError {
    /// Required configuration is missing or unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The caller is not allowed to use serverless backends.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote side returned a non-2xx status code.
    #[error("Remote API error ({status}): {body}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A response body could not be decoded as the expected JSON shape.
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The worker did not report ready within the startup budget.
    #[error("Worker did not become ready within {timeout_secs}s")]
    WorkerStartupTimeout {
        /// Configured startup budget that was exhausted.
        timeout_secs: u64,
    },

    /// Model discovery found nothing before its deadline.
    #[error("No models discovered within {deadline_secs}s")]
    DiscoveryTimeout {
        /// Overall discovery deadline that was exhausted.
        deadline_secs: u64,
    },

    /// An async control-plane job did not reach a terminal status
    /// within the polling budget.
    #[error("Job {job_id} did not complete within the polling budget")]
    JobTimeout {
        /// Control-plane job identifier.
        job_id: String,
    },

    /// The control plane reported the job as failed.
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Generation completed but produced no usable images.
    #[error("Generation returned no images")]
    EmptyResult,

    /// The operation was cancelled from outside.
    #[error("Operation cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_display_includes_status_and_body() {
        let err = ServerlessError::Transport {
            status: 502,
            body: "upstream gone".to_string(),
        };
        assert_eq!(err.to_string(), "Remote API error (502): upstream gone");
    }

    #[test]
    fn timeout_displays_include_budgets() {
        let err = ServerlessError::WorkerStartupTimeout { timeout_secs: 600 };
        assert_eq!(err.to_string(), "Worker did not become ready within 600s");

        let err = ServerlessError::JobTimeout {
            job_id: "j1".to_string(),
        };
        assert!(err.to_string().contains("j1"));
    }

    #[test]
    fn json_errors_convert_to_malformed() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ServerlessError = parse_err.into();
        assert!(matches!(err, ServerlessError::Malformed(_)));
    }
}
