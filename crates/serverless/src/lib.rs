//! Serverless GPU worker orchestration.
//!
//! Coordinates ephemeral on-demand workers behind a job-queue control
//! plane: waking a cold worker, polling until it reports ready, keeping
//! it alive exactly as long as needed, discovering its models with
//! bounded retries, dispatching generation calls against its direct
//! API, and guaranteeing a shutdown signal on every exit path.

pub mod backend;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod images;
pub mod lifecycle;
pub mod params;
pub mod registry;
pub mod retry;
pub mod worker;
