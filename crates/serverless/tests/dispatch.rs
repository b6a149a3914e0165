//! Integration tests for the control-plane job client, run against a
//! loopback stub control plane.

mod common;

use assert_matches::assert_matches;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use coldspark_serverless::dispatch::{ControlPlaneClient, JobEnvelope};
use coldspark_serverless::error::ServerlessError;

use common::{job_action, serve, CallCounter, RequestLog};

// ---------------------------------------------------------------------------
// Test: async dispatch submits, polls status, and unwraps the output
// ---------------------------------------------------------------------------

#[tokio::test]
async fn async_dispatch_polls_status_until_complete() {
    let log = RequestLog::new();
    let polls = CallCounter::new();

    let run_log = log.clone();
    let status_log = log.clone();
    let status_polls = polls.clone();
    let app = Router::new()
        .route(
            "/ep1/run",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let log = run_log.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("<none>");
                    log.record(format!("auth:{auth}"));
                    log.record(format!("run:{}", job_action(&body)));
                    Json(json!({ "id": "job-1" }))
                }
            }),
        )
        .route(
            "/ep1/status/{id}",
            get(move |Path(id): Path<String>| {
                let log = status_log.clone();
                let polls = status_polls.clone();
                async move {
                    log.record(format!("status:{id}"));
                    let response = match polls.next() {
                        0 => json!({ "status": "IN_QUEUE" }),
                        1 => json!({ "status": "IN_PROGRESS" }),
                        _ => json!({ "status": "COMPLETED", "output": { "ok": true } }),
                    };
                    Json(response)
                }
            }),
        );

    let base = serve(app).await;
    let client = ControlPlaneClient::with_api_base(&base, "ep1", "test-key");

    let result = client
        .dispatch(&JobEnvelope::shutdown(), false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result, json!({ "ok": true }));
    assert_eq!(log.count("status:job-1"), 3);
    assert_eq!(log.count("run:shutdown"), 1);
    assert!(log.contains("auth:Bearer test-key"));
}

// ---------------------------------------------------------------------------
// Test: sync dispatch returns the unwrapped result directly
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_dispatch_unwraps_output_object() {
    let log = RequestLog::new();

    let runsync_log = log.clone();
    let app = Router::new().route(
        "/ep1/runsync",
        post(move |Json(body): Json<Value>| {
            let log = runsync_log.clone();
            async move {
                log.record(format!("runsync:{}", job_action(&body)));
                Json(json!({
                    "id": "sync-1",
                    "status": "COMPLETED",
                    "output": { "healthy": true },
                }))
            }
        }),
    );

    let base = serve(app).await;
    let client = ControlPlaneClient::with_api_base(&base, "ep1", "test-key");

    let result = client
        .dispatch(&JobEnvelope::health(), true, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result, json!({ "healthy": true }));
    assert_eq!(log.count("runsync:health"), 1);
}

// ---------------------------------------------------------------------------
// Test: a queue response without a job id is already the result
// ---------------------------------------------------------------------------

#[tokio::test]
async fn queue_response_without_id_is_the_result() {
    let log = RequestLog::new();

    let run_log = log.clone();
    let status_log = log.clone();
    let app = Router::new()
        .route(
            "/ep1/run",
            post(move |Json(_): Json<Value>| {
                let log = run_log.clone();
                async move {
                    log.record("run");
                    Json(json!({ "status": "COMPLETED", "output": { "done": true } }))
                }
            }),
        )
        .route(
            "/ep1/status/{id}",
            get(move |Path(id): Path<String>| {
                let log = status_log.clone();
                async move {
                    log.record(format!("status:{id}"));
                    Json(json!({ "status": "COMPLETED" }))
                }
            }),
        );

    let base = serve(app).await;
    let client = ControlPlaneClient::with_api_base(&base, "ep1", "test-key");

    let result = client
        .dispatch(&JobEnvelope::ready(), false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result, json!({ "done": true }));
    assert_eq!(log.entries(), vec!["run"]);
}

// ---------------------------------------------------------------------------
// Test: a FAILED job surfaces the remote error text
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_job_surfaces_remote_error() {
    let app = Router::new()
        .route(
            "/ep1/run",
            post(|| async { Json(json!({ "id": "job-2" })) }),
        )
        .route(
            "/ep1/status/{id}",
            get(|| async { Json(json!({ "status": "FAILED", "error": "worker exploded" })) }),
        );

    let base = serve(app).await;
    let client = ControlPlaneClient::with_api_base(&base, "ep1", "test-key");

    let result = client
        .dispatch(&JobEnvelope::ready(), false, &CancellationToken::new())
        .await;

    assert_matches!(
        result,
        Err(ServerlessError::JobFailed(reason)) if reason == "worker exploded"
    );
}

// ---------------------------------------------------------------------------
// Test: a non-2xx control-plane response is a transport error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_success_status_is_a_transport_error() {
    let app = Router::new().route(
        "/ep1/runsync",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "endpoint misconfigured") }),
    );

    let base = serve(app).await;
    let client = ControlPlaneClient::with_api_base(&base, "ep1", "test-key");

    let result = client
        .run_sync(&JobEnvelope::ready(), &CancellationToken::new())
        .await;

    assert_matches!(
        result,
        Err(ServerlessError::Transport { status: 500, body }) if body == "endpoint misconfigured"
    );
}

// ---------------------------------------------------------------------------
// Test: cancellation interrupts a sync dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_token_aborts_sync_dispatch() {
    let app = Router::new().route(
        "/ep1/runsync",
        post(|| async { Json(json!({ "status": "COMPLETED" })) }),
    );

    let base = serve(app).await;
    let client = ControlPlaneClient::with_api_base(&base, "ep1", "test-key");

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = client.run_sync(&JobEnvelope::ready(), &cancel).await;
    assert_matches!(result, Err(ServerlessError::Cancelled));
}
