//! Shared helpers for API integration tests.
//!
//! Requests are driven through `tower::ServiceExt::oneshot` against the
//! real application router, so every test exercises the full middleware
//! stack (CORS, request ID, timeout, panic recovery).

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use coldspark_api::config::ServerConfig;
use coldspark_api::router::build_app_router;
use coldspark_api::state::AppState;
use coldspark_core::catalog::ModelCatalog;
use coldspark_core::config::EndpointConfig;
use coldspark_core::types::BackendId;
use coldspark_serverless::backend::ServerlessBackend;
use coldspark_serverless::host::{
    CatalogPublisher, CredentialStore, HostServices, PermissionGate,
};
use coldspark_serverless::registry::BackendRegistry;

/// Credential store with no stored keys.
pub struct NoCredentials;

#[async_trait]
impl CredentialStore for NoCredentials {
    async fn api_key_for(&self, _session_id: &str) -> Option<String> {
        None
    }
}

/// Permission gate with a fixed verdict for every session.
pub struct FixedGate(pub bool);

#[async_trait]
impl PermissionGate for FixedGate {
    async fn can_use_serverless(&self, _session_id: &str) -> bool {
        self.0
    }
}

/// Publisher that discards every committed catalog.
pub struct DiscardPublisher;

#[async_trait]
impl CatalogPublisher for DiscardPublisher {
    async fn publish(&self, _backend_id: BackendId, _catalog: &ModelCatalog) {}
}

/// Host collaborators for tests: no credentials, everything permitted,
/// published catalogs discarded.
pub fn test_host() -> HostServices {
    HostServices {
        credentials: Arc::new(NoCredentials),
        permissions: Arc::new(FixedGate(true)),
        publisher: Arc::new(DiscardPublisher),
    }
}

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        model_categories: vec!["Stable-Diffusion".to_string()],
    }
}

/// A registry holding one backend configured with the given endpoint id.
pub async fn registry_with_backend(endpoint_id: &str) -> Arc<BackendRegistry> {
    let config = EndpointConfig {
        endpoint_id: endpoint_id.to_string(),
        ..EndpointConfig::default()
    };
    let backend = ServerlessBackend::new(
        1,
        "Test Serverless",
        config,
        vec!["Stable-Diffusion".to_string()],
        test_host(),
    );

    let registry = Arc::new(BackendRegistry::new());
    registry.register(Arc::new(backend)).await;
    registry
}

/// Build the full application router backed by the given registry, with
/// every session permitted.
pub fn build_test_app(registry: Arc<BackendRegistry>) -> Router {
    build_test_app_with_gate(registry, Arc::new(FixedGate(true)))
}

/// Build the application router with an explicit permission gate.
pub fn build_test_app_with_gate(
    registry: Arc<BackendRegistry>,
    permissions: Arc<dyn PermissionGate>,
) -> Router {
    let config = test_config();
    let state = AppState {
        config: Arc::new(config.clone()),
        registry,
        permissions,
        shutdown: CancellationToken::new(),
    };
    build_app_router(state, &config)
}

/// Issue a GET request against the app.
pub async fn get(app: Router, path: &str) -> Response {
    app.oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Issue a GET request carrying an `X-Session-Id` header.
pub async fn get_with_session(app: Router, path: &str, session: &str) -> Response {
    app.oneshot(
        Request::builder()
            .uri(path)
            .header("X-Session-Id", session)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Issue a POST request carrying an `X-Session-Id` header.
pub async fn post_with_session(app: Router, path: &str, session: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("X-Session-Id", session)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Parse a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
