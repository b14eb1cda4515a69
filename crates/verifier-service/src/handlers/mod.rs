//! HTTP request handlers for the verifier service.

pub mod health;
pub mod identity;
pub mod metrics;

pub use health::health_check;
pub use identity::{get_identity, IdentityResponse};
pub use metrics::metrics_handler;
