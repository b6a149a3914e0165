//! Registry of configured serverless backends.
//!
//! The HTTP layer talks to backends through [`BackendRegistry`]: it
//! resolves ids, fans a catalog refresh out across every registered
//! backend, and collects status snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use coldspark_core::status::{BackendSnapshot, RefreshSummary};
use coldspark_core::types::BackendId;

use crate::backend::ServerlessBackend;
use crate::error::ServerlessError;

/// All serverless backends known to this process, keyed by id.
#[derive(Default)]
pub struct BackendRegistry {
    backends: RwLock<HashMap<BackendId, Arc<ServerlessBackend>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend, replacing any previous entry with the same id.
    pub async fn register(&self, backend: Arc<ServerlessBackend>) {
        self.backends.write().await.insert(backend.id(), backend);
    }

    pub async fn get(&self, id: BackendId) -> Option<Arc<ServerlessBackend>> {
        self.backends.read().await.get(&id).cloned()
    }

    pub async fn is_empty(&self) -> bool {
        self.backends.read().await.is_empty()
    }

    /// Initialize every registered backend concurrently.
    pub async fn init_all(&self, session_id: Option<&str>, cancel: &CancellationToken) {
        let backends = self.all().await;
        join_all(
            backends
                .iter()
                .map(|backend| backend.init(session_id, cancel)),
        )
        .await;
    }

    /// Refresh the model catalog of every registered backend.
    ///
    /// Backends fail independently; one broken endpoint does not stop
    /// the others from refreshing. Only an empty registry is an error.
    pub async fn refresh_all(
        &self,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<RefreshSummary, ServerlessError> {
        let backends = self.all().await;
        if backends.is_empty() {
            return Err(ServerlessError::Configuration(
                "No serverless backends are registered".to_string(),
            ));
        }

        let mut refreshed = 0;
        let mut failed = 0;
        for backend in &backends {
            match backend.refresh_models(session_id, cancel).await {
                Ok(snapshot) => {
                    tracing::info!(
                        backend_id = backend.id(),
                        model_count = snapshot.model_count(),
                        "Backend refresh complete",
                    );
                    refreshed += 1;
                }
                Err(e) => {
                    tracing::warn!(backend_id = backend.id(), error = %e, "Backend refresh failed");
                    failed += 1;
                }
            }
        }

        Ok(RefreshSummary {
            refreshed,
            failed,
            message: format!("Refreshed {refreshed} serverless backend(s), {failed} failed."),
        })
    }

    /// Mark every registered backend idle. Called when the host shuts down.
    pub async fn shutdown_all(&self) {
        let backends = self.all().await;
        join_all(backends.iter().map(|backend| backend.shutdown())).await;
    }

    /// Status snapshot of every registered backend, ordered by id.
    pub async fn snapshots(&self) -> Vec<BackendSnapshot> {
        let backends = self.all().await;
        let mut snapshots = join_all(backends.iter().map(|backend| backend.snapshot())).await;
        snapshots.sort_by_key(|s| s.id);
        snapshots
    }

    async fn all(&self) -> Vec<Arc<ServerlessBackend>> {
        self.backends.read().await.values().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
