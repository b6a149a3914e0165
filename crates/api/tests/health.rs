//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get};
use coldspark_serverless::registry::BackendRegistry;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = common::build_test_app(Arc::new(BackendRegistry::new()));
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;

    // The response must contain "status", "version", and "backends" fields.
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["backends"], 0);
}

// ---------------------------------------------------------------------------
// Test: /health reports the registered backend count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_counts_registered_backends() {
    let registry = common::registry_with_backend("ep-1").await;
    let app = common::build_test_app(registry);

    let response = get(app, "/health").await;
    let json = body_json(response).await;

    assert_eq!(json["backends"], 1);
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = common::build_test_app(Arc::new(BackendRegistry::new()));
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = common::build_test_app(Arc::new(BackendRegistry::new()));
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let request_id = response.headers().get("x-request-id");
    assert!(
        request_id.is_some(),
        "Response must contain an x-request-id header"
    );

    // The value should be a valid UUID (36 chars with hyphens).
    let id_str = request_id.unwrap().to_str().unwrap();
    assert_eq!(id_str.len(), 36, "x-request-id should be a UUID string");
}

// ---------------------------------------------------------------------------
// Test: CORS preflight OPTIONS request returns correct headers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_returns_correct_headers() {
    let app = common::build_test_app(Arc::new(BackendRegistry::new()));

    // CORS preflight requires custom headers, so we build the request manually.
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/serverless/status")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "x-session-id")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    // CORS preflight should return 200.
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();

    // Access-Control-Allow-Origin must match the request origin.
    let allow_origin = headers
        .get("access-control-allow-origin")
        .expect("Missing Access-Control-Allow-Origin header")
        .to_str()
        .unwrap();
    assert_eq!(allow_origin, "http://localhost:5173");

    // Access-Control-Allow-Headers must include the session header.
    let allow_headers = headers
        .get("access-control-allow-headers")
        .expect("Missing Access-Control-Allow-Headers header")
        .to_str()
        .unwrap();
    assert!(
        allow_headers.contains("x-session-id"),
        "Allow-Headers should contain x-session-id, got: {allow_headers}"
    );
}
