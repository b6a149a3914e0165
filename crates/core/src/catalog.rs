//! Model catalog snapshots discovered from a serverless worker.
//!
//! A catalog is an immutable snapshot. Discovery builds a complete new
//! [`ModelCatalog`] and commits it wholesale through [`CatalogStore`];
//! concurrent readers always observe either the previous complete
//! snapshot or the new one, never a partially updated state.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::types::Timestamp;

/// Where a catalog entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelOrigin {
    /// Present on the host's own disk.
    Local,
    /// Discovered on a remote serverless worker.
    Remote,
}

/// One model as reported by a worker's listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteModel {
    /// Model identifier as the worker reports it.
    pub name: String,
    /// Category (subtype) the model was listed under.
    pub category: String,
    /// Origin tag carried into downstream registries.
    pub origin: ModelOrigin,
    /// Raw listing entry for this model, as returned by the worker.
    pub details: serde_json::Value,
}

/// An immutable snapshot of every model known for one backend.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    /// Model names per category, in the order the worker listed them.
    names: HashMap<String, Vec<String>>,
    /// Full entries per category, keyed by model name.
    models: HashMap<String, HashMap<String, RemoteModel>>,
    /// When this snapshot was committed. `None` for the initial empty
    /// catalog of a backend that has never refreshed.
    refreshed_at: Option<Timestamp>,
}

impl ModelCatalog {
    /// Build a snapshot from per-category listings.
    ///
    /// Categories that yielded no models still get an (empty) entry so
    /// a committed snapshot always covers every category that was
    /// queried.
    pub fn from_categories(
        categories: HashMap<String, Vec<RemoteModel>>,
        refreshed_at: Timestamp,
    ) -> Self {
        let mut names: HashMap<String, Vec<String>> = HashMap::new();
        let mut models: HashMap<String, HashMap<String, RemoteModel>> = HashMap::new();

        for (category, entries) in categories {
            let ordered: Vec<String> = entries.iter().map(|m| m.name.clone()).collect();
            let by_name: HashMap<String, RemoteModel> =
                entries.into_iter().map(|m| (m.name.clone(), m)).collect();
            names.insert(category.clone(), ordered);
            models.insert(category, by_name);
        }

        Self {
            names,
            models,
            refreshed_at: Some(refreshed_at),
        }
    }

    /// Total number of models across all categories.
    pub fn model_count(&self) -> usize {
        self.names.values().map(|v| v.len()).sum()
    }

    /// True when no category holds any model.
    pub fn is_empty(&self) -> bool {
        self.model_count() == 0
    }

    /// Model names listed under `category`, in worker order. Empty when
    /// the category is unknown.
    pub fn models_in(&self, category: &str) -> &[String] {
        self.names.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up one model's full entry.
    pub fn get(&self, category: &str, name: &str) -> Option<&RemoteModel> {
        self.models.get(category)?.get(name)
    }

    /// Iterate over every model entry in the snapshot.
    pub fn iter_models(&self) -> impl Iterator<Item = &RemoteModel> {
        self.models.values().flat_map(|by_name| by_name.values())
    }

    /// When this snapshot was committed.
    pub fn refreshed_at(&self) -> Option<Timestamp> {
        self.refreshed_at
    }
}

/// Shared holder for a backend's current catalog snapshot.
///
/// Writers replace the whole `Arc` under a short-lived write lock;
/// readers clone the `Arc` and work with a consistent snapshot without
/// holding the lock.
#[derive(Debug, Default)]
pub struct CatalogStore {
    current: RwLock<Arc<ModelCatalog>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Cheap; clones an `Arc`.
    pub async fn snapshot(&self) -> Arc<ModelCatalog> {
        self.current.read().await.clone()
    }

    /// Replace the current snapshot wholesale. Returns the newly
    /// committed snapshot.
    pub async fn commit(&self, catalog: ModelCatalog) -> Arc<ModelCatalog> {
        let snapshot = Arc::new(catalog);
        *self.current.write().await = snapshot.clone();
        snapshot
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(name: &str, category: &str) -> RemoteModel {
        RemoteModel {
            name: name.to_string(),
            category: category.to_string(),
            origin: ModelOrigin::Remote,
            details: json!({ "name": name }),
        }
    }

    #[test]
    fn default_catalog_is_empty() {
        let catalog = ModelCatalog::default();
        assert!(catalog.is_empty());
        assert_eq!(catalog.model_count(), 0);
        assert!(catalog.refreshed_at().is_none());
        assert!(catalog.models_in("Stable-Diffusion").is_empty());
    }

    #[test]
    fn from_categories_preserves_listing_order() {
        let mut categories = HashMap::new();
        categories.insert(
            "Stable-Diffusion".to_string(),
            vec![model("zeta", "Stable-Diffusion"), model("alpha", "Stable-Diffusion")],
        );
        categories.insert("LoRA".to_string(), Vec::new());

        let catalog = ModelCatalog::from_categories(categories, chrono::Utc::now());

        assert_eq!(catalog.models_in("Stable-Diffusion"), ["zeta", "alpha"]);
        assert!(catalog.models_in("LoRA").is_empty());
        assert_eq!(catalog.model_count(), 2);
        assert!(catalog.get("Stable-Diffusion", "alpha").is_some());
        assert!(catalog.get("LoRA", "alpha").is_none());
        assert!(catalog.refreshed_at().is_some());
    }

    #[tokio::test]
    async fn commit_replaces_snapshot_without_disturbing_old_readers() {
        let store = CatalogStore::new();
        let before = store.snapshot().await;
        assert!(before.is_empty());

        let mut categories = HashMap::new();
        categories.insert(
            "Stable-Diffusion".to_string(),
            vec![model("alpha", "Stable-Diffusion")],
        );
        store
            .commit(ModelCatalog::from_categories(categories, chrono::Utc::now()))
            .await;

        // The old snapshot is untouched; new readers see the new one.
        assert!(before.is_empty());
        let after = store.snapshot().await;
        assert_eq!(after.model_count(), 1);
    }
}
