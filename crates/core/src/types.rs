/// Backends are keyed by host-assigned numeric ids.
pub type BackendId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
