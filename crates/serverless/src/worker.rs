//! Direct HTTP client for an awake worker's own API.
//!
//! Once a worker reports ready, model listing, model selection,
//! sub-service status, and generation calls go straight to its public
//! URL, bypassing the control-plane job queue.

use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::ServerlessError;
use crate::lifecycle::WorkerHandle;

/// Listing depth requested from the worker; deep enough to cover any
/// real model folder hierarchy.
const LIST_MODELS_DEPTH: u32 = 999;

/// One model entry parsed from a worker listing response.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    /// Model identifier as the worker reports it.
    pub name: String,
    /// Raw listing entry.
    pub details: Value,
}

/// HTTP client bound to one ready worker and its session.
pub struct WorkerApi {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
}

impl WorkerApi {
    /// Create a client for the worker behind `handle`.
    pub fn new(handle: &WorkerHandle) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: handle.public_url.trim_end_matches('/').to_string(),
            session_id: handle.session_id.clone(),
        }
    }

    /// List models of one category (subtype).
    ///
    /// Entries the worker reports without a usable name are skipped
    /// with a log line.
    pub async fn list_models(
        &self,
        category: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ModelEntry>, ServerlessError> {
        let body = json!({
            "session_id": self.session_id,
            "path": "",
            "depth": LIST_MODELS_DEPTH,
            "subtype": category,
            "allowRemote": false,
            "sortBy": "Name",
            "sortReverse": false,
            "dataImages": true,
        });

        let response = self.call("/API/ListModels", body, cancel).await?;
        Ok(Self::extract_model_entries(&response))
    }

    /// Ask the worker to load `model` for the session.
    ///
    /// Returns the worker's success verdict; a response without one
    /// reads as failure.
    pub async fn select_model(
        &self,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ServerlessError> {
        let body = json!({
            "session_id": self.session_id,
            "model": model,
        });

        let response = self.call("/API/SelectModel", body, cancel).await?;
        Ok(response
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// Status strings of the worker's internal generation sub-services.
    pub async fn backend_statuses(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ServerlessError> {
        let body = json!({
            "session_id": self.session_id,
            "nonreal": false,
            "full_data": false,
        });

        let response = self.call("/API/ListBackends", body, cancel).await?;
        Ok(Self::extract_backend_statuses(&response))
    }

    /// Dispatch a generation request with a caller-chosen budget.
    ///
    /// `request` must be a complete request body including the session
    /// id (see [`crate::params::GenerationParams::to_worker_request`]).
    pub async fn generate(
        &self,
        request: Value,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value, ServerlessError> {
        self.call_with_timeout("/API/GenerateText2Image", request, Some(timeout), cancel)
            .await
    }

    /// POST a JSON body to an arbitrary worker API path.
    pub async fn call(
        &self,
        path: &str,
        body: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ServerlessError> {
        self.call_with_timeout(path, body, None, cancel).await
    }

    // ---- private helpers ----

    async fn call_with_timeout(
        &self,
        path: &str,
        body: Value,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Value, ServerlessError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!(url = %url, "Calling worker API");

        let mut request = self.client.post(url).json(&body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ServerlessError::Cancelled),
            result = request.send() => result?,
        };

        Self::parse_response(response).await
    }

    /// Ensure the response has a success status code, or fail with the
    /// status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ServerlessError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ServerlessError::Transport {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful response body as JSON.
    async fn parse_response(response: reqwest::Response) -> Result<Value, ServerlessError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<Value>().await?)
    }

    /// Pull usable model entries out of a listing response.
    ///
    /// Entries are either objects carrying a `name` field or bare name
    /// strings; anything else is skipped.
    fn extract_model_entries(response: &Value) -> Vec<ModelEntry> {
        let Some(files) = response.get("files").and_then(Value::as_array) else {
            tracing::warn!("Model listing response carries no files array");
            return Vec::new();
        };

        let mut entries = Vec::new();
        for file in files {
            match file {
                Value::Object(data) => {
                    let name = data.get("name").and_then(Value::as_str).unwrap_or("");
                    if name.trim().is_empty() {
                        tracing::debug!(entry = %file, "Skipping model entry without name");
                        continue;
                    }
                    entries.push(ModelEntry {
                        name: name.to_string(),
                        details: file.clone(),
                    });
                }
                Value::String(name) if !name.trim().is_empty() => {
                    entries.push(ModelEntry {
                        name: name.clone(),
                        details: json!({ "name": name }),
                    });
                }
                other => {
                    tracing::debug!(entry = %other, "Skipping unrecognized model entry");
                }
            }
        }
        entries
    }

    /// Pull per-sub-service status strings out of a status response.
    fn extract_backend_statuses(response: &Value) -> Vec<String> {
        let Some(map) = response.as_object() else {
            return Vec::new();
        };
        map.values()
            .filter_map(|entry| entry.get("status").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
