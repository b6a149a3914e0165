use std::sync::Arc;

use coldspark_serverless::host::PermissionGate;
use coldspark_serverless::registry::BackendRegistry;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Registered serverless backends.
    pub registry: Arc<BackendRegistry>,
    /// Session permission checks for the serverless routes.
    pub permissions: Arc<dyn PermissionGate>,
    /// Cancelled when the server begins graceful shutdown; in-flight
    /// refresh polling observes it and exits promptly.
    pub shutdown: CancellationToken,
}
