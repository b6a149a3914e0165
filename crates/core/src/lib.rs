//! Shared domain types for the coldspark workspace.
//!
//! Holds the serverless endpoint configuration, the model catalog
//! snapshot types, and the backend status types used by both the
//! orchestration crate and the HTTP API.

pub mod catalog;
pub mod config;
pub mod status;
pub mod types;
