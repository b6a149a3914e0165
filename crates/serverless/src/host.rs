//! Seams toward the host application embedding this crate.
//!
//! The host owns sessions, credentials, permissions, and its own model
//! registry; backends reach those through these traits so the
//! orchestration logic stays host-agnostic.

use std::sync::Arc;

use async_trait::async_trait;

use coldspark_core::catalog::ModelCatalog;
use coldspark_core::types::BackendId;

/// Looks up a caller's stored control-plane API key.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The key stored for `session_id`, if any.
    async fn api_key_for(&self, session_id: &str) -> Option<String>;
}

/// Decides whether a session may use serverless backends.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn can_use_serverless(&self, session_id: &str) -> bool;
}

/// Receives each newly committed catalog snapshot so the host can
/// mirror remote models into its own registry.
///
/// Publication is best-effort from the backend's point of view;
/// implementations handle their own failures.
#[async_trait]
pub trait CatalogPublisher: Send + Sync {
    async fn publish(&self, backend_id: BackendId, catalog: &ModelCatalog);
}

/// The host collaborators a backend needs, bundled for construction.
#[derive(Clone)]
pub struct HostServices {
    pub credentials: Arc<dyn CredentialStore>,
    pub permissions: Arc<dyn PermissionGate>,
    pub publisher: Arc<dyn CatalogPublisher>,
}
