//! Middleware for the verifier service.
//!
//! # Components
//!
//! - `auth` - Bearer token authentication for the verifier endpoint
//! - `http_metrics` - Request/response metrics for every route

pub mod auth;
pub mod http_metrics;

pub use auth::{extract_bearer_token, require_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
