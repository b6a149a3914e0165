//! Control-plane job client.
//!
//! Submits jobs (wakeup, readiness probe, health, keepalive, shutdown)
//! to the serverless control plane using [`reqwest`]. Synchronous jobs
//! return their result directly; asynchronous jobs return a job id
//! that is polled at a fixed interval until a terminal status.

use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::ServerlessError;
use crate::retry::{poll_until, PollConfig, PollOutcome};

/// Public control-plane API base used when none is configured.
pub const DEFAULT_API_BASE: &str = "https://api.runpod.ai/v2";

/// Fixed delay between async job status polls.
pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Status polls allowed for one async job before giving up (about five
/// minutes at the fixed poll interval).
pub const JOB_POLL_MAX_ATTEMPTS: u32 = 300;

// ---------------------------------------------------------------------------
// Job envelopes
// ---------------------------------------------------------------------------

/// Actions understood by the worker-side job handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Wakeup,
    Ready,
    Health,
    Keepalive,
    Shutdown,
}

impl JobAction {
    /// Wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            JobAction::Wakeup => "wakeup",
            JobAction::Ready => "ready",
            JobAction::Health => "health",
            JobAction::Keepalive => "keepalive",
            JobAction::Shutdown => "shutdown",
        }
    }
}

/// One control-plane job: an action plus its parameters.
#[derive(Debug, Clone)]
pub struct JobEnvelope {
    action: JobAction,
    parameters: serde_json::Map<String, Value>,
}

impl JobEnvelope {
    fn new(action: JobAction) -> Self {
        Self {
            action,
            parameters: serde_json::Map::new(),
        }
    }

    /// Wake a cold worker and keep it alive for `duration_secs`,
    /// pinging every `interval_secs`.
    pub fn wakeup(duration_secs: u64, interval_secs: u64) -> Self {
        let mut envelope = Self::new(JobAction::Wakeup);
        envelope
            .parameters
            .insert("duration".to_string(), json!(duration_secs));
        envelope
            .parameters
            .insert("interval".to_string(), json!(interval_secs));
        envelope
    }

    /// Probe whether the worker is ready for direct calls.
    pub fn ready() -> Self {
        Self::new(JobAction::Ready)
    }

    /// Ask the worker handler for a health verdict.
    pub fn health() -> Self {
        Self::new(JobAction::Health)
    }

    /// Extend a live worker's lifetime.
    pub fn keepalive(duration_secs: u64, interval_secs: u64) -> Self {
        let mut envelope = Self::new(JobAction::Keepalive);
        envelope
            .parameters
            .insert("duration".to_string(), json!(duration_secs));
        envelope
            .parameters
            .insert("interval".to_string(), json!(interval_secs));
        envelope
    }

    /// Signal the worker to shut down now.
    pub fn shutdown() -> Self {
        Self::new(JobAction::Shutdown)
    }

    /// Which action this envelope carries.
    pub fn action(&self) -> JobAction {
        self.action
    }

    /// Request body in the control plane's `{"input": {...}}` shape.
    pub fn to_body(&self) -> Value {
        let mut input = serde_json::Map::new();
        input.insert("action".to_string(), json!(self.action.as_str()));
        for (key, value) in &self.parameters {
            input.insert(key.clone(), value.clone());
        }
        json!({ "input": input })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for one control-plane endpoint.
///
/// Cloning is cheap and shares the underlying connection pool, which
/// lets fire-and-forget tasks carry their own handle.
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    client: reqwest::Client,
    api_base: String,
    endpoint_id: String,
    api_key: String,
}

impl ControlPlaneClient {
    /// Create a client against the public control plane.
    pub fn new(endpoint_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_api_base(DEFAULT_API_BASE, endpoint_id, api_key)
    }

    /// Create a client against a specific control-plane base URL.
    pub fn with_api_base(
        api_base: impl Into<String>,
        endpoint_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            endpoint_id: endpoint_id.into(),
            api_key: api_key.into(),
        }
    }

    /// Endpoint identifier this client talks to.
    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    /// Submit a job and return its result.
    ///
    /// With `sync` the control plane blocks and the response is the
    /// result. Otherwise the job is queued, and its status is polled
    /// until `COMPLETED` or `FAILED`; a queue response without a job id
    /// is treated as the result itself.
    pub async fn dispatch(
        &self,
        envelope: &JobEnvelope,
        sync: bool,
        cancel: &CancellationToken,
    ) -> Result<Value, ServerlessError> {
        if sync {
            return self.run_sync(envelope, cancel).await;
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ServerlessError::Cancelled),
            result = self.submit("run", envelope) => result?,
        };

        match response.get("id").and_then(Value::as_str) {
            Some(job_id) if !job_id.is_empty() => {
                let job_id = job_id.to_string();
                self.poll_until_done(&job_id, cancel).await
            }
            _ => Ok(Self::unwrap_output(response)),
        }
    }

    /// Submit a synchronous job; the response is the result.
    pub async fn run_sync(
        &self,
        envelope: &JobEnvelope,
        cancel: &CancellationToken,
    ) -> Result<Value, ServerlessError> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ServerlessError::Cancelled),
            result = self.submit("runsync", envelope) => result?,
        };
        Ok(Self::unwrap_output(response))
    }

    /// Queue an asynchronous job without waiting for its result.
    ///
    /// Returns the assigned job id, if the control plane reported one.
    pub async fn enqueue(&self, envelope: &JobEnvelope) -> Result<Option<String>, ServerlessError> {
        let response = self.submit("run", envelope).await?;
        Ok(response
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string))
    }

    /// Poll an async job's status until a terminal state.
    ///
    /// Request hiccups on individual polls are swallowed and the poll
    /// retried; a non-2xx control-plane response aborts immediately.
    /// The budget is [`JOB_POLL_MAX_ATTEMPTS`] polls at
    /// [`JOB_POLL_INTERVAL`].
    pub async fn poll_until_done(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, ServerlessError> {
        let config = PollConfig {
            interval: JOB_POLL_INTERVAL,
            deadline: JOB_POLL_INTERVAL * JOB_POLL_MAX_ATTEMPTS,
        };

        let outcome = poll_until(&config, cancel, |attempt| async move {
            match self.fetch_status(job_id).await {
                Ok(status) => Self::interpret_status(job_id, status),
                Err(ServerlessError::Request(e)) => {
                    tracing::debug!(job_id, attempt, error = %e, "Job status poll failed");
                    None
                }
                Err(e) => Some(Err(e)),
            }
        })
        .await;

        match outcome {
            PollOutcome::Ready(result) => result,
            PollOutcome::DeadlineExceeded { .. } => Err(ServerlessError::JobTimeout {
                job_id: job_id.to_string(),
            }),
            PollOutcome::Cancelled => Err(ServerlessError::Cancelled),
        }
    }

    // ---- private helpers ----

    /// Decide whether a status payload is terminal.
    ///
    /// `COMPLETED` yields the unwrapped output, `FAILED` yields the
    /// remote error text, anything else keeps the poll going.
    fn interpret_status(job_id: &str, status: Value) -> Option<Result<Value, ServerlessError>> {
        match status.get("status").and_then(Value::as_str) {
            Some("COMPLETED") => Some(Ok(Self::unwrap_output(status))),
            Some("FAILED") => {
                let reason = status
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("Job failed")
                    .to_string();
                Some(Err(ServerlessError::JobFailed(reason)))
            }
            other => {
                tracing::debug!(job_id, status = ?other, "Job still in progress");
                None
            }
        }
    }

    /// Fetch one async job's status document.
    async fn fetch_status(&self, job_id: &str) -> Result<Value, ServerlessError> {
        let response = self
            .client
            .get(format!(
                "{}/{}/status/{}",
                self.api_base, self.endpoint_id, job_id
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// POST a job envelope to `{base}/{endpoint}/{path}`.
    async fn submit(&self, path: &str, envelope: &JobEnvelope) -> Result<Value, ServerlessError> {
        tracing::debug!(
            endpoint_id = %self.endpoint_id,
            action = envelope.action().as_str(),
            path,
            "Submitting control-plane job",
        );

        let response = self
            .client
            .post(format!("{}/{}/{}", self.api_base, self.endpoint_id, path))
            .bearer_auth(&self.api_key)
            .json(&envelope.to_body())
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a
    /// [`ServerlessError::Transport`] with the status and body text on
    /// failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ServerlessError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ServerlessError::Transport {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful response body as JSON.
    async fn parse_response(response: reqwest::Response) -> Result<Value, ServerlessError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<Value>().await?)
    }

    /// Peel the control plane's `output` wrapper, when present as an
    /// object; otherwise the raw document is the result.
    fn unwrap_output(mut value: Value) -> Value {
        if value.get("output").is_some_and(Value::is_object) {
            return value["output"].take();
        }
        value
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
