//! Backend lifecycle status and the snapshots surfaced over the API.

use serde::Serialize;

use crate::types::BackendId;

/// Lifecycle status of one serverless backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    /// Init in progress (possibly running an auto-refresh).
    Loading,
    /// Ready to serve generation and refresh requests.
    Running,
    /// Shut down; no worker activity expected.
    Idle,
    /// Init or a later operation left the backend unusable.
    Errored,
}

/// Point-in-time view of one backend, as reported by the status API.
#[derive(Debug, Clone, Serialize)]
pub struct BackendSnapshot {
    /// Host-assigned backend id.
    pub id: BackendId,
    /// Human-readable backend title.
    pub title: String,
    /// Current lifecycle status.
    pub status: BackendStatus,
    /// Control-plane endpoint identifier (may be empty if unconfigured).
    pub endpoint_id: String,
    /// Total models across all catalog categories.
    pub model_count: usize,
    /// Whether the backend refreshes its catalog on init.
    pub auto_refresh: bool,
    /// Configured cap on concurrent generation calls.
    pub max_concurrent: u32,
}

/// Outcome of a refresh pass over every registered backend.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    /// Backends whose catalog refresh succeeded.
    pub refreshed: usize,
    /// Backends whose catalog refresh failed.
    pub failed: usize,
    /// Human-readable summary line.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
