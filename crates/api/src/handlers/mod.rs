//! Request handlers for the API routes.
//!
//! Handlers delegate to the backend registry and map orchestration
//! errors to HTTP responses via [`crate::error::AppError`].

pub mod serverless;
