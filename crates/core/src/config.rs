//! Per-endpoint configuration for a serverless worker backend.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default delay between readiness probes while waiting for a cold
/// worker to come up.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default budget for a cold worker to become ready, and for its
/// internal sub-services to finish loading.
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 600;

/// Default budget for a single generation call against a live worker.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 600;

/// Default cap on concurrent generation calls per backend.
pub const DEFAULT_MAX_CONCURRENT: u32 = 10;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for one serverless endpoint.
///
/// Immutable for the lifetime of a backend instance. All fields have
/// defaults suitable for local development except `endpoint_id`, which
/// must be set before the backend can talk to the control plane.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Control-plane endpoint identifier. Empty means unconfigured.
    pub endpoint_id: String,
    /// Backend-scoped API key. When absent, the calling session's
    /// stored key is used instead.
    pub api_key: Option<String>,
    /// Delay between worker readiness probes (default: `2000`).
    pub poll_interval_ms: u64,
    /// Budget for a cold worker to become ready (default: `600`).
    pub startup_timeout_secs: u64,
    /// Budget for a single generation call (default: `600`).
    pub generation_timeout_secs: u64,
    /// Refresh the model catalog automatically on init (default: `false`).
    pub auto_refresh: bool,
    /// Cap on concurrent generation calls (default: `10`).
    pub max_concurrent: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            endpoint_id: String::new(),
            api_key: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT_SECS,
            generation_timeout_secs: DEFAULT_GENERATION_TIMEOUT_SECS,
            auto_refresh: false,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl EndpointConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                            | Default  |
    /// |------------------------------------|----------|
    /// | `SERVERLESS_ENDPOINT_ID`           | *(empty)*|
    /// | `SERVERLESS_API_KEY`               | *(none)* |
    /// | `SERVERLESS_POLL_INTERVAL_MS`      | `2000`   |
    /// | `SERVERLESS_STARTUP_TIMEOUT_SECS`  | `600`    |
    /// | `SERVERLESS_GENERATION_TIMEOUT_SECS` | `600`  |
    /// | `SERVERLESS_AUTO_REFRESH`          | `false`  |
    /// | `SERVERLESS_MAX_CONCURRENT`        | `10`     |
    pub fn from_env() -> Self {
        let endpoint_id = std::env::var("SERVERLESS_ENDPOINT_ID")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let api_key = std::env::var("SERVERLESS_API_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let poll_interval_ms: u64 = std::env::var("SERVERLESS_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL_MS.to_string())
            .parse()
            .expect("SERVERLESS_POLL_INTERVAL_MS must be a valid u64");

        let startup_timeout_secs: u64 = std::env::var("SERVERLESS_STARTUP_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_STARTUP_TIMEOUT_SECS.to_string())
            .parse()
            .expect("SERVERLESS_STARTUP_TIMEOUT_SECS must be a valid u64");

        let generation_timeout_secs: u64 = std::env::var("SERVERLESS_GENERATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_GENERATION_TIMEOUT_SECS.to_string())
            .parse()
            .expect("SERVERLESS_GENERATION_TIMEOUT_SECS must be a valid u64");

        let auto_refresh = std::env::var("SERVERLESS_AUTO_REFRESH")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let max_concurrent: u32 = std::env::var("SERVERLESS_MAX_CONCURRENT")
            .unwrap_or_else(|_| DEFAULT_MAX_CONCURRENT.to_string())
            .parse()
            .expect("SERVERLESS_MAX_CONCURRENT must be a valid u32");

        Self {
            endpoint_id,
            api_key,
            poll_interval_ms,
            startup_timeout_secs,
            generation_timeout_secs,
            auto_refresh,
            max_concurrent,
        }
    }

    /// Delay between readiness probes as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Worker startup budget as a [`Duration`].
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Generation call budget as a [`Duration`].
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
