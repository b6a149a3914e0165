#![allow(dead_code)]

//! Loopback stub servers for orchestration integration tests.
//!
//! Tests build an [`axum`] router that plays the control plane (and,
//! where needed, the worker's direct API), bind it on an ephemeral
//! loopback port, and point the real clients at it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use serde_json::Value;

/// Bind an ephemeral loopback port. Returns the listener and its base
/// URL, so a router can embed the URL in its own responses before
/// serving starts.
pub async fn bind() -> (tokio::net::TcpListener, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let base = format!("http://{}", listener.local_addr().expect("listener address"));
    (listener, base)
}

/// Serve `router` on `listener` in the background for the rest of the
/// test.
pub fn serve_on(listener: tokio::net::TcpListener, router: Router) {
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve stub");
    });
}

/// Bind `router` on an ephemeral loopback port and serve it in the
/// background for the rest of the test. Returns the base URL.
pub async fn serve(router: Router) -> String {
    let (listener, base) = bind().await;
    serve_on(listener, router);
    base
}

/// Thread-safe log of the requests a stub server has handled.
#[derive(Clone, Default)]
pub struct RequestLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == entry)
            .count()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.count(entry) > 0
    }

    /// Block until `entry` has been recorded, or panic after five
    /// seconds.
    pub async fn wait_for(&self, entry: &str) {
        for _ in 0..500 {
            if self.contains(entry) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("stub never saw {entry:?}; log: {:?}", self.entries());
    }
}

/// Monotonic call counter for handlers that script different responses
/// per call. The first call observes `0`.
#[derive(Clone, Default)]
pub struct CallCounter {
    calls: Arc<AtomicUsize>,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// The `action` field of a control-plane job body, for request logs.
pub fn job_action(body: &Value) -> String {
    body["input"]["action"]
        .as_str()
        .unwrap_or("<no action>")
        .to_string()
}

/// Control-plane routes for a worker that reports ready at once and
/// points its public URL back at the stub itself.
///
/// Queue submissions are recorded as `run:<action>:<duration>`, sync
/// jobs as `runsync:<action>`.
pub fn control_plane_routes(log: &RequestLog, public_url: &str) -> Router {
    use axum::routing::post;
    use axum::Json;
    use serde_json::json;

    let run_log = log.clone();
    let runsync_log = log.clone();
    let public_url = public_url.to_string();
    Router::new()
        .route(
            "/ep1/run",
            post(move |Json(body): Json<Value>| {
                let log = run_log.clone();
                async move {
                    log.record(format!(
                        "run:{}:{}",
                        job_action(&body),
                        body["input"]["duration"]
                    ));
                    Json(json!({ "id": "q-1" }))
                }
            }),
        )
        .route(
            "/ep1/runsync",
            post(move |Json(body): Json<Value>| {
                let log = runsync_log.clone();
                let public_url = public_url.clone();
                async move {
                    let action = job_action(&body);
                    log.record(format!("runsync:{action}"));
                    let output = match action.as_str() {
                        "ready" => json!({
                            "ready": true,
                            "public_url": public_url,
                            "session_id": "s1",
                            "worker_id": "id1",
                        }),
                        _ => json!({}),
                    };
                    Json(json!({ "status": "COMPLETED", "output": output }))
                }
            }),
        )
}
