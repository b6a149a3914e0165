//! One configured serverless backend.
//!
//! [`ServerlessBackend`] owns an endpoint's configuration, lifecycle
//! status, and catalog snapshot, and runs the two top-level use cases:
//! refreshing the model catalog from a freshly woken worker, and
//! dispatching a generation request. Both wake their own worker and
//! always signal shutdown on the way out, whatever the outcome.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use coldspark_core::catalog::{CatalogStore, ModelCatalog};
use coldspark_core::config::EndpointConfig;
use coldspark_core::status::{BackendSnapshot, BackendStatus};
use coldspark_core::types::BackendId;

use crate::discovery::run_discovery;
use crate::dispatch::{ControlPlaneClient, DEFAULT_API_BASE};
use crate::error::ServerlessError;
use crate::host::HostServices;
use crate::images::{decode_images, GeneratedImage};
use crate::lifecycle::{WorkerHandle, WorkerLifecycle};
use crate::params::{toggle_model_extension, GenerationParams};
use crate::retry::{poll_until, PollConfig, PollOutcome};
use crate::worker::WorkerApi;

/// Keepalive requested for a generation run, sized to cover cold
/// start, sub-service loading, and the render itself.
const GENERATION_KEEPALIVE_SECS: u64 = 180;

/// One serverless endpoint with its config, status, and catalog.
///
/// Created once per configured endpoint and shared via `Arc`; all
/// state is interior so request handlers can call it concurrently.
pub struct ServerlessBackend {
    id: BackendId,
    title: String,
    config: EndpointConfig,
    categories: Vec<String>,
    host: HostServices,
    status: RwLock<BackendStatus>,
    catalog: CatalogStore,
    api_base: String,
}

impl ServerlessBackend {
    pub fn new(
        id: BackendId,
        title: impl Into<String>,
        config: EndpointConfig,
        categories: Vec<String>,
        host: HostServices,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            config,
            categories,
            host,
            status: RwLock::new(BackendStatus::Loading),
            catalog: CatalogStore::new(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point this backend at a different control-plane base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn id(&self) -> BackendId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Current catalog snapshot.
    pub async fn catalog(&self) -> Arc<ModelCatalog> {
        self.catalog.snapshot().await
    }

    /// Current lifecycle status.
    pub async fn status(&self) -> BackendStatus {
        *self.status.read().await
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Bring the backend up, optionally refreshing the catalog first.
    ///
    /// An auto-refresh failure is only a warning; the backend still
    /// comes up and can be refreshed manually later. Misconfiguration
    /// is permanent, so it parks the backend in
    /// [`BackendStatus::Errored`] instead.
    pub async fn init(&self, session_id: Option<&str>, cancel: &CancellationToken) {
        self.set_status(BackendStatus::Loading).await;
        tracing::info!(backend_id = self.id, title = %self.title, "Starting serverless backend");

        if self.config.auto_refresh {
            match self.refresh_models(session_id, cancel).await {
                Ok(snapshot) => {
                    tracing::info!(
                        backend_id = self.id,
                        model_count = snapshot.model_count(),
                        "Auto refresh complete",
                    );
                }
                Err(e @ ServerlessError::Configuration(_)) => {
                    tracing::error!(backend_id = self.id, error = %e, "Auto refresh failed");
                    self.set_status(BackendStatus::Errored).await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(backend_id = self.id, error = %e, "Auto refresh failed");
                }
            }
        }

        self.set_status(BackendStatus::Running).await;
        tracing::info!(backend_id = self.id, "Serverless backend ready");
    }

    /// Mark the backend idle. No worker is running between operations,
    /// so there is nothing remote to tear down.
    pub async fn shutdown(&self) {
        self.set_status(BackendStatus::Idle).await;
    }

    /// Point-in-time view for the status API.
    pub async fn snapshot(&self) -> BackendSnapshot {
        BackendSnapshot {
            id: self.id,
            title: self.title.clone(),
            status: self.status().await,
            endpoint_id: self.config.endpoint_id.clone(),
            model_count: self.catalog.snapshot().await.model_count(),
            auto_refresh: self.config.auto_refresh,
            max_concurrent: self.config.max_concurrent,
        }
    }

    // -----------------------------------------------------------------
    // Model refresh
    // -----------------------------------------------------------------

    /// Wake a worker, discover its models, and commit the catalog.
    ///
    /// On success the committed snapshot is also handed to the host's
    /// catalog publisher.
    pub async fn refresh_models(
        &self,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Arc<ModelCatalog>, ServerlessError> {
        self.require_endpoint()?;
        let api_key = self.resolve_api_key(session_id).await?;
        let lifecycle = WorkerLifecycle::new(self.control_plane(&api_key));

        let snapshot =
            run_discovery(&lifecycle, &self.config, &self.categories, &self.catalog, cancel)
                .await?;

        self.host.publisher.publish(self.id, &snapshot).await;
        Ok(snapshot)
    }

    // -----------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------

    /// Run one generation request end to end.
    ///
    /// Wakes a worker, waits for its sub-services, ensures the
    /// requested model is selected (with one extension-toggle retry),
    /// dispatches the render, and decodes the returned images. The
    /// worker gets a shutdown signal on every exit path.
    pub async fn generate(
        &self,
        session_id: &str,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<GeneratedImage>, ServerlessError> {
        if !self.host.permissions.can_use_serverless(session_id).await {
            return Err(ServerlessError::PermissionDenied(
                "Session is not permitted to use serverless backends".to_string(),
            ));
        }
        let api_key = self.resolve_api_key(Some(session_id)).await?;
        self.require_endpoint()?;

        let run_id = Uuid::new_v4();
        tracing::info!(
            backend_id = self.id,
            run_id = %run_id,
            endpoint_id = %self.config.endpoint_id,
            "Starting generation",
        );

        let lifecycle = WorkerLifecycle::new(self.control_plane(&api_key));
        let wake_poll = PollConfig {
            interval: self.config.poll_interval(),
            deadline: self.config.startup_timeout(),
        };

        let handle = match lifecycle
            .wake_and_wait(GENERATION_KEEPALIVE_SECS, &wake_poll, cancel)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                // The worker may have come up just after the budget
                // ran out; make sure it does not idle on the clock.
                lifecycle.shutdown_quietly().await;
                return Err(e);
            }
        };

        let result = self.run_generation(&handle, params, cancel).await;
        lifecycle.shutdown_quietly().await;

        match &result {
            Ok(images) => {
                tracing::info!(run_id = %run_id, images = images.len(), "Generation complete");
            }
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Generation failed");
            }
        }
        result
    }

    // ---- private helpers ----

    /// Everything between a ready worker and decoded images. Split out
    /// so [`Self::generate`] can bolt cleanup onto every exit path.
    async fn run_generation(
        &self,
        handle: &WorkerHandle,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<GeneratedImage>, ServerlessError> {
        let worker = WorkerApi::new(handle);

        self.wait_for_subservices(&worker, cancel).await?;

        let mut effective = params.clone();
        if !effective.model.trim().is_empty() {
            effective.model = self.ensure_model_selected(&worker, &effective.model, cancel).await;
        }

        let request = effective.to_worker_request(&handle.session_id);
        let response = worker
            .generate(request, self.config.generation_timeout(), cancel)
            .await?;

        let images = decode_images(&response);
        if images.is_empty() {
            return Err(ServerlessError::EmptyResult);
        }
        Ok(images)
    }

    /// Wait until none of the worker's internal sub-services report a
    /// loading state.
    ///
    /// Individual status reads that fail are retried like any other
    /// probe; only the exhausted budget ends the wait early, logging
    /// and proceeding to generation regardless.
    async fn wait_for_subservices(
        &self,
        worker: &WorkerApi,
        cancel: &CancellationToken,
    ) -> Result<(), ServerlessError> {
        let poll = PollConfig {
            interval: self.config.poll_interval(),
            deadline: self.config.startup_timeout(),
        };

        let outcome = poll_until(&poll, cancel, |attempt| async move {
            match worker.backend_statuses(cancel).await {
                Ok(statuses) => {
                    let loading = statuses
                        .iter()
                        .filter(|s| s.eq_ignore_ascii_case("loading"))
                        .count();
                    if loading == 0 {
                        Some(())
                    } else {
                        tracing::debug!(attempt, loading, "Worker sub-services still loading");
                        None
                    }
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Could not read sub-service status");
                    None
                }
            }
        })
        .await;

        match outcome {
            PollOutcome::Ready(()) => Ok(()),
            PollOutcome::DeadlineExceeded { attempts } => {
                tracing::warn!(attempts, "Sub-services still loading; attempting generation anyway");
                Ok(())
            }
            PollOutcome::Cancelled => Err(ServerlessError::Cancelled),
        }
    }

    /// Ask the worker to load `requested`, retrying exactly once with
    /// the `.safetensors` suffix toggled.
    ///
    /// Returns the name that actually selected, or the requested name
    /// with a warning when both attempts fail; the worker may still
    /// have a usable model loaded.
    async fn ensure_model_selected(
        &self,
        worker: &WorkerApi,
        requested: &str,
        cancel: &CancellationToken,
    ) -> String {
        match worker.select_model(requested, cancel).await {
            Ok(true) => return requested.to_string(),
            Ok(false) => {
                tracing::debug!(model = %requested, "Worker rejected model selection");
            }
            Err(e) => {
                tracing::debug!(model = %requested, error = %e, "Model selection call failed");
            }
        }

        let fallback = toggle_model_extension(requested);
        match worker.select_model(&fallback, cancel).await {
            Ok(true) => {
                tracing::info!(model = %fallback, "Selected model via extension fallback");
                fallback
            }
            _ => {
                tracing::warn!(
                    model = %requested,
                    fallback = %fallback,
                    "Model selection failed for both forms; proceeding with requested name",
                );
                requested.to_string()
            }
        }
    }

    /// Backend-scoped API key when configured, else the session's
    /// stored key.
    async fn resolve_api_key(
        &self,
        session_id: Option<&str>,
    ) -> Result<String, ServerlessError> {
        if let Some(key) = self
            .config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
        {
            return Ok(key.to_string());
        }

        let Some(session_id) = session_id else {
            return Err(ServerlessError::Configuration(
                "API key not found. Set a backend API key or call with a session that has one configured".to_string(),
            ));
        };

        match self.host.credentials.api_key_for(session_id).await {
            Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(ServerlessError::Configuration(
                "API key not found. Store an API key for the session before using this backend"
                    .to_string(),
            )),
        }
    }

    fn require_endpoint(&self) -> Result<(), ServerlessError> {
        if self.config.endpoint_id.trim().is_empty() {
            return Err(ServerlessError::Configuration(
                "Endpoint ID is not configured for this backend".to_string(),
            ));
        }
        Ok(())
    }

    fn control_plane(&self, api_key: &str) -> ControlPlaneClient {
        ControlPlaneClient::with_api_base(&self.api_base, &self.config.endpoint_id, api_key)
    }

    async fn set_status(&self, status: BackendStatus) {
        *self.status.write().await = status;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
