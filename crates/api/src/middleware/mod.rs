//! Session extraction and authorization extractors.
//!
//! - [`session::SessionId`] -- Extracts the calling session from the `X-Session-Id` header.
//! - [`session::RequireServerless`] -- Additionally requires serverless permission.

pub mod session;
