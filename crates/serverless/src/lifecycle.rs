//! Worker lifecycle: wakeup, readiness polling, keepalive, shutdown.
//!
//! One orchestration run drives a single worker through
//! `Idle -> WakeupSent -> Polling -> Ready`, or `-> TimedOut` once the
//! startup budget is spent. The wakeup job is queued fire-and-forget;
//! the control plane's own infrastructure performs the keepalive pings
//! the job declares, so nothing here ever waits on it.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{ControlPlaneClient, JobEnvelope};
use crate::error::ServerlessError;
use crate::retry::{poll_until, PollConfig, PollOutcome};

/// Delay between queueing the wakeup job and the first readiness
/// probe, giving the cold start a moment to begin.
pub const WAKEUP_GRACE: Duration = Duration::from_secs(2);

/// Ping interval requested with wakeup and keepalive jobs.
pub const KEEPALIVE_PING_INTERVAL_SECS: u64 = 15;

/// Connection details for a worker that reported ready.
///
/// Produced once per successful wakeup and owned by the orchestration
/// run that created it; never shared across concurrent runs.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    /// Base URL of the worker's direct HTTP API.
    pub public_url: String,
    /// Session the worker opened for this run.
    pub session_id: String,
    /// Control-plane identifier of the physical worker.
    pub worker_id: String,
    /// Worker software version, when reported.
    pub version: Option<String>,
}

/// One readiness probe response, discarded after each poll.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessProbe {
    /// Whether the worker is ready for direct calls.
    #[serde(default)]
    pub ready: bool,
    /// Base URL of the worker's direct HTTP API.
    pub public_url: Option<String>,
    /// Session the worker opened.
    pub session_id: Option<String>,
    /// Control-plane identifier of the physical worker.
    pub worker_id: Option<String>,
    /// Worker software version.
    pub version: Option<String>,
    /// Startup progress or error detail while not ready.
    pub error: Option<String>,
}

impl ReadinessProbe {
    /// Build a [`WorkerHandle`] when the probe reports ready with
    /// complete connection details.
    pub fn into_handle(self) -> Option<WorkerHandle> {
        if !self.ready {
            return None;
        }
        match (self.public_url, self.session_id, self.worker_id) {
            (Some(public_url), Some(session_id), Some(worker_id)) => Some(WorkerHandle {
                public_url,
                session_id,
                worker_id,
                version: self.version,
            }),
            _ => None,
        }
    }
}

/// Drives one worker's lifecycle through the control plane.
pub struct WorkerLifecycle {
    client: ControlPlaneClient,
}

impl WorkerLifecycle {
    pub fn new(client: ControlPlaneClient) -> Self {
        Self { client }
    }

    /// Wake a cold worker and wait for it to report ready.
    ///
    /// Queues a wakeup job asking the control plane to keep the worker
    /// alive for `keepalive_secs`, waits a short grace period, then
    /// probes readiness at `poll.interval` until `poll.deadline` is
    /// spent. Individual probe failures are swallowed; only the
    /// exhausted budget fails the call.
    pub async fn wake_and_wait(
        &self,
        keepalive_secs: u64,
        poll: &PollConfig,
        cancel: &CancellationToken,
    ) -> Result<WorkerHandle, ServerlessError> {
        self.send_wakeup(keepalive_secs);

        tokio::select! {
            _ = cancel.cancelled() => return Err(ServerlessError::Cancelled),
            _ = tokio::time::sleep(WAKEUP_GRACE) => {}
        }

        tracing::info!(
            endpoint_id = %self.client.endpoint_id(),
            timeout_secs = poll.deadline.as_secs(),
            "Waiting for worker to become ready",
        );

        let outcome = poll_until(poll, cancel, |attempt| async move {
            self.probe_ready(attempt, cancel).await
        })
        .await;

        match outcome {
            PollOutcome::Ready(handle) => {
                tracing::info!(
                    worker_id = %handle.worker_id,
                    public_url = %handle.public_url,
                    "Worker ready",
                );
                Ok(handle)
            }
            PollOutcome::DeadlineExceeded { attempts } => {
                tracing::warn!(
                    endpoint_id = %self.client.endpoint_id(),
                    attempts,
                    "Worker never reported ready",
                );
                Err(ServerlessError::WorkerStartupTimeout {
                    timeout_secs: poll.deadline.as_secs(),
                })
            }
            PollOutcome::Cancelled => Err(ServerlessError::Cancelled),
        }
    }

    /// Extend a live worker's lifetime, fire-and-forget.
    pub fn keep_alive(&self, duration_secs: u64, interval_secs: u64) {
        let client = self.client.clone();
        let envelope = JobEnvelope::keepalive(duration_secs, interval_secs);
        // The handle is deliberately dropped: the job queue owns the
        // keepalive from here.
        let _task = tokio::spawn(async move {
            if let Err(e) = client.enqueue(&envelope).await {
                tracing::debug!(error = %e, "Keepalive submit failed");
            }
        });
    }

    /// Control-plane health verdict for the worker. Any failure reads
    /// as unhealthy.
    pub async fn health_check(&self, cancel: &CancellationToken) -> bool {
        match self.client.run_sync(&JobEnvelope::health(), cancel).await {
            Ok(value) => value.get("healthy").and_then(Value::as_bool).unwrap_or(false),
            Err(e) => {
                tracing::debug!(error = %e, "Health check failed");
                false
            }
        }
    }

    /// Best-effort shutdown signal. Never fails toward the caller: the
    /// worker may have already scaled down on its own.
    pub async fn shutdown_quietly(&self) {
        let cancel = CancellationToken::new();
        match self.client.run_sync(&JobEnvelope::shutdown(), &cancel).await {
            Ok(_) => {
                tracing::debug!(
                    endpoint_id = %self.client.endpoint_id(),
                    "Worker shutdown signalled",
                );
            }
            Err(e) => {
                tracing::debug!(
                    endpoint_id = %self.client.endpoint_id(),
                    error = %e,
                    "Shutdown signal failed (worker may have already scaled down)",
                );
            }
        }
    }

    // ---- private helpers ----

    /// Queue the wakeup job without waiting for it.
    fn send_wakeup(&self, keepalive_secs: u64) {
        let client = self.client.clone();
        let envelope = JobEnvelope::wakeup(keepalive_secs, KEEPALIVE_PING_INTERVAL_SECS);
        // The handle is deliberately dropped: the control plane keeps
        // pinging the worker for the declared duration on its own.
        let _task = tokio::spawn(async move {
            match client.enqueue(&envelope).await {
                Ok(job_id) => tracing::debug!(job_id = ?job_id, "Wakeup job queued"),
                Err(e) => tracing::debug!(error = %e, "Wakeup submit failed"),
            }
        });
    }

    /// One readiness probe. Returns the handle once the worker reports
    /// ready with complete details; every failure mode yields `None`.
    async fn probe_ready(&self, attempt: u32, cancel: &CancellationToken) -> Option<WorkerHandle> {
        let value = match self.client.run_sync(&JobEnvelope::ready(), cancel).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(attempt, error = %e, "Ready check failed");
                return None;
            }
        };

        let probe: ReadinessProbe = match serde_json::from_value(value) {
            Ok(probe) => probe,
            Err(e) => {
                tracing::debug!(attempt, error = %e, "Undecodable readiness probe");
                return None;
            }
        };

        if !probe.ready {
            if let Some(detail) = &probe.error {
                tracing::debug!(attempt, detail = %detail, "Worker not ready yet");
            }
            return None;
        }

        match probe.into_handle() {
            Some(handle) => Some(handle),
            None => {
                tracing::warn!(attempt, "Worker reported ready without connection details");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn probe_deserializes_wire_fields() {
        let probe: ReadinessProbe = serde_json::from_value(json!({
            "ready": true,
            "public_url": "https://w1.example",
            "session_id": "s1",
            "worker_id": "id1",
            "version": "0.9.8",
        }))
        .unwrap();
        assert!(probe.ready);
        assert_eq!(probe.public_url.as_deref(), Some("https://w1.example"));
        assert_eq!(probe.version.as_deref(), Some("0.9.8"));
    }

    #[test]
    fn probe_defaults_to_not_ready() {
        let probe: ReadinessProbe =
            serde_json::from_value(json!({ "error": "models still loading" })).unwrap();
        assert!(!probe.ready);
        assert_eq!(probe.error.as_deref(), Some("models still loading"));
        assert!(probe.into_handle().is_none());
    }

    #[test]
    fn ready_probe_without_connection_details_yields_no_handle() {
        let probe: ReadinessProbe = serde_json::from_value(json!({
            "ready": true,
            "session_id": "s1",
        }))
        .unwrap();
        assert!(probe.into_handle().is_none());
    }

    #[test]
    fn ready_probe_builds_handle() {
        let probe: ReadinessProbe = serde_json::from_value(json!({
            "ready": true,
            "public_url": "https://w1.example",
            "session_id": "s1",
            "worker_id": "id1",
        }))
        .unwrap();
        let handle = probe.into_handle().unwrap();
        assert_eq!(handle.public_url, "https://w1.example");
        assert_eq!(handle.session_id, "s1");
        assert_eq!(handle.worker_id, "id1");
        assert_eq!(handle.version, None);
    }
}
