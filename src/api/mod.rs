//! HTTP API Module
//!
//! Health, status, peer listing and metrics endpoints for operators.

mod routes;
mod metrics;

pub use routes::run_api_server;
pub use metrics::Metrics;
