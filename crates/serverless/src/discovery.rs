//! Model discovery against a live worker.
//!
//! Wakes a worker, fans out one listing request per model category,
//! and retries the whole fan-out as a unit until anything turns up or
//! an overall deadline is spent. The worker's own model scan may still
//! be warming up when it first reports ready, which is why a
//! zero-total attempt is "not yet" rather than an error. Results are
//! committed as one atomic snapshot, and the worker is always signalled
//! to shut down afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use coldspark_core::catalog::{CatalogStore, ModelCatalog, ModelOrigin, RemoteModel};
use coldspark_core::config::EndpointConfig;

use crate::error::ServerlessError;
use crate::lifecycle::{WorkerLifecycle, KEEPALIVE_PING_INTERVAL_SECS};
use crate::retry::{poll_until, PollConfig, PollOutcome};
use crate::worker::{ModelEntry, WorkerApi};

/// Floor on the overall discovery deadline, applied even when the
/// startup timeout is configured shorter.
pub const DISCOVERY_DEADLINE_FLOOR: Duration = Duration::from_secs(120);

/// Backoff between whole-catalog attempts while the worker's model
/// scan warms up.
pub const DISCOVERY_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Keepalive requested beyond the discovery deadline so the worker
/// survives the full retry window.
const KEEPALIVE_BUFFER_SECS: u64 = 60;

/// Timing knobs for the discovery retry loop.
///
/// Production uses the defaults; tests shrink both to run the loop to
/// its deadline in milliseconds instead of minutes.
#[derive(Debug, Clone)]
pub struct DiscoveryTuning {
    /// Floor on the overall deadline.
    pub deadline_floor: Duration,
    /// Backoff between whole-catalog attempts.
    pub retry_interval: Duration,
}

impl Default for DiscoveryTuning {
    fn default() -> Self {
        Self {
            deadline_floor: DISCOVERY_DEADLINE_FLOOR,
            retry_interval: DISCOVERY_RETRY_INTERVAL,
        }
    }
}

/// Wake a worker, discover its models, and commit them to `store`.
///
/// Returns the committed snapshot. The previous snapshot is only ever
/// replaced by a run that found at least one model; the worker gets a
/// shutdown signal on every exit path.
pub async fn run_discovery(
    lifecycle: &WorkerLifecycle,
    config: &EndpointConfig,
    categories: &[String],
    store: &CatalogStore,
    cancel: &CancellationToken,
) -> Result<Arc<ModelCatalog>, ServerlessError> {
    run_discovery_with(
        lifecycle,
        config,
        categories,
        store,
        &DiscoveryTuning::default(),
        cancel,
    )
    .await
}

/// [`run_discovery`] with explicit timing knobs.
pub async fn run_discovery_with(
    lifecycle: &WorkerLifecycle,
    config: &EndpointConfig,
    categories: &[String],
    store: &CatalogStore,
    tuning: &DiscoveryTuning,
    cancel: &CancellationToken,
) -> Result<Arc<ModelCatalog>, ServerlessError> {
    if categories.is_empty() {
        return Err(ServerlessError::Configuration(
            "No model categories configured for discovery".to_string(),
        ));
    }

    let deadline = config.startup_timeout().max(tuning.deadline_floor);
    let keepalive_secs = deadline.as_secs() + KEEPALIVE_BUFFER_SECS;

    let wake_poll = PollConfig {
        interval: config.poll_interval(),
        deadline: config.startup_timeout(),
    };

    let handle = match lifecycle.wake_and_wait(keepalive_secs, &wake_poll, cancel).await {
        Ok(handle) => handle,
        Err(e) => {
            // The worker may have come up just after the budget ran
            // out; make sure it does not idle on the clock.
            lifecycle.shutdown_quietly().await;
            return Err(e);
        }
    };

    tracing::info!(
        worker_id = %handle.worker_id,
        public_url = %handle.public_url,
        categories = categories.len(),
        "Starting model discovery",
    );

    let worker = WorkerApi::new(&handle);
    let result = discover_catalog(
        lifecycle,
        &worker,
        categories,
        deadline,
        tuning.retry_interval,
        keepalive_secs,
        store,
        cancel,
    )
    .await;

    lifecycle.shutdown_quietly().await;
    result
}

/// The bounded retry loop around the per-category fan-out.
async fn discover_catalog(
    lifecycle: &WorkerLifecycle,
    worker: &WorkerApi,
    categories: &[String],
    deadline: Duration,
    retry_interval: Duration,
    keepalive_secs: u64,
    store: &CatalogStore,
    cancel: &CancellationToken,
) -> Result<Arc<ModelCatalog>, ServerlessError> {
    let poll = PollConfig {
        interval: retry_interval,
        deadline,
    };

    let outcome = poll_until(&poll, cancel, |attempt| async move {
        if attempt > 1 {
            // The model scan outlived the original wakeup window;
            // extend the worker's lease for another full round.
            lifecycle.keep_alive(keepalive_secs, KEEPALIVE_PING_INTERVAL_SECS);
        }

        let results = fetch_all_categories(worker, categories, cancel).await;
        let total: usize = results.values().map(Vec::len).sum();
        if total == 0 {
            tracing::info!(attempt, "Worker reported no models yet");
            None
        } else {
            Some(results)
        }
    })
    .await;

    match outcome {
        PollOutcome::Ready(results) => {
            let catalog = ModelCatalog::from_categories(results, chrono::Utc::now());
            let snapshot = store.commit(catalog).await;
            tracing::info!(
                model_count = snapshot.model_count(),
                "Model catalog committed",
            );
            Ok(snapshot)
        }
        PollOutcome::DeadlineExceeded { attempts } => {
            tracing::warn!(attempts, "Model discovery found nothing before the deadline");
            Err(ServerlessError::DiscoveryTimeout {
                deadline_secs: deadline.as_secs(),
            })
        }
        PollOutcome::Cancelled => Err(ServerlessError::Cancelled),
    }
}

/// One concurrent listing request per category.
///
/// A category whose fetch fails degrades to an empty listing so it
/// cannot block the others.
async fn fetch_all_categories(
    worker: &WorkerApi,
    categories: &[String],
    cancel: &CancellationToken,
) -> HashMap<String, Vec<RemoteModel>> {
    let fetches = categories.iter().map(|category| async move {
        let entries = match worker.list_models(category, cancel).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    category = %category,
                    error = %e,
                    "Failed to list models for category",
                );
                Vec::new()
            }
        };
        tracing::debug!(category = %category, count = entries.len(), "Listed category");
        let models = entries
            .into_iter()
            .map(|entry| into_remote_model(entry, category))
            .collect();
        (category.clone(), models)
    });

    futures::future::join_all(fetches).await.into_iter().collect()
}

/// Tag a listing entry as a remote model of `category`.
fn into_remote_model(entry: ModelEntry, category: &str) -> RemoteModel {
    let mut details = entry.details;
    if let Some(map) = details.as_object_mut() {
        map.insert("local".to_string(), json!(false));
    }
    RemoteModel {
        name: entry.name,
        category: category.to_string(),
        origin: ModelOrigin::Remote,
        details,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_models_are_tagged_non_local() {
        let entry = ModelEntry {
            name: "modelA".to_string(),
            details: json!({ "name": "modelA", "architecture": "sdxl" }),
        };

        let model = into_remote_model(entry, "Stable-Diffusion");
        assert_eq!(model.name, "modelA");
        assert_eq!(model.category, "Stable-Diffusion");
        assert_eq!(model.origin, ModelOrigin::Remote);
        assert_eq!(model.details["local"], false);
        assert_eq!(model.details["architecture"], "sdxl");
    }

    #[test]
    fn tuning_defaults_to_production_timing() {
        let tuning = DiscoveryTuning::default();
        assert_eq!(tuning.deadline_floor, DISCOVERY_DEADLINE_FLOOR);
        assert_eq!(tuning.retry_interval, DISCOVERY_RETRY_INTERVAL);
    }

    #[test]
    fn deadline_floor_applies_to_short_startup_timeouts() {
        let config = EndpointConfig {
            startup_timeout_secs: 30,
            ..Default::default()
        };
        let deadline = config.startup_timeout().max(DISCOVERY_DEADLINE_FLOOR);
        assert_eq!(deadline, Duration::from_secs(120));

        let config = EndpointConfig {
            startup_timeout_secs: 600,
            ..Default::default()
        };
        let deadline = config.startup_timeout().max(DISCOVERY_DEADLINE_FLOOR);
        assert_eq!(deadline, Duration::from_secs(600));
    }
}
