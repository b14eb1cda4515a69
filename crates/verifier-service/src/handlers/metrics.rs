//! Prometheus scrape endpoint.
//!
//! Public, like `/health`. Labels are bounded and never carry tenant ids,
//! subjects or token material.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Renders the recorder in Prometheus text format, e.g.
/// `verifier_token_validations_total{outcome="expired"} 3`.
#[tracing::instrument(skip_all, name = "verifier.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
