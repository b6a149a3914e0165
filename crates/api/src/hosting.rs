//! Host-collaborator implementations for the standalone server.
//!
//! The orchestration crate reaches sessions, permissions, and the host
//! model registry through the traits in `coldspark_serverless::host`.
//! Running standalone there is no surrounding application, so
//! credentials come from the environment, every session is permitted,
//! and committed catalogs are logged rather than mirrored anywhere.

use std::sync::Arc;

use async_trait::async_trait;

use coldspark_core::catalog::ModelCatalog;
use coldspark_core::types::BackendId;
use coldspark_serverless::host::{CatalogPublisher, CredentialStore, HostServices, PermissionGate};

/// Serves one shared API key from `SERVERLESS_SESSION_API_KEY` to every
/// session.
pub struct EnvCredentialStore;

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn api_key_for(&self, _session_id: &str) -> Option<String> {
        std::env::var("SERVERLESS_SESSION_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

/// Permits every session.
pub struct OpenPermissionGate;

#[async_trait]
impl PermissionGate for OpenPermissionGate {
    async fn can_use_serverless(&self, _session_id: &str) -> bool {
        true
    }
}

/// Logs each committed catalog instead of mirroring it into a registry.
pub struct LogCatalogPublisher;

#[async_trait]
impl CatalogPublisher for LogCatalogPublisher {
    async fn publish(&self, backend_id: BackendId, catalog: &ModelCatalog) {
        tracing::info!(
            backend_id,
            models = catalog.model_count(),
            "Catalog committed"
        );
    }
}

/// Bundle the standalone collaborators for backend construction.
pub fn standalone_host() -> HostServices {
    HostServices {
        credentials: Arc::new(EnvCredentialStore),
        permissions: Arc::new(OpenPermissionGate),
        publisher: Arc::new(LogCatalogPublisher),
    }
}
