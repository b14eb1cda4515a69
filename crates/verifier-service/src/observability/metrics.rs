//! Metrics definitions for the verifier service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `verifier_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP method, 7 values max
//! - `endpoint`: 4 values (known routes plus `/other`)
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: 8 values (`valid` plus one per failure kind)
//! - `result`: cache lookup result (hit, miss, refresh)
//!
//! Tenant ids are never used as label values.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Histogram buckets:
/// - HTTP requests: 5ms to 10s (discovery on a cold cache can take seconds)
/// - Token validation: 50us to 50ms (pure CPU work)
/// - JWKS fetches: 10ms to the maximum discovery timeout
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("verifier_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("verifier_token_validation".to_string()),
            &[0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.010, 0.050],
        )
        .map_err(|e| format!("Failed to set token validation buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("verifier_jwks_fetch".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 25.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `verifier_http_requests_total`, `verifier_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// This captures ALL HTTP responses including framework-level errors such as
/// 404 Not Found and 405 Method Not Allowed.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("verifier_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("verifier_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/api/SecureFunction" => "/api/SecureFunction",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record the outcome of one token validation.
///
/// Metric: `verifier_token_validations_total`, `verifier_token_validation_duration_seconds`
/// Labels: `outcome` (`valid` or a failure kind label)
pub fn record_token_validation(outcome: &'static str, duration: Duration) {
    histogram!("verifier_token_validation_duration_seconds",
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());

    counter!("verifier_token_validations_total",
        "outcome" => outcome
    )
    .increment(1);
}

// ============================================================================
// Signing Key Metrics
// ============================================================================

/// Record a discovery + JWKS fetch.
///
/// Metric: `verifier_jwks_fetch_duration_seconds`, `verifier_jwks_fetches_total`
/// Labels: `status` (success, error, timeout)
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
    histogram!("verifier_jwks_fetch_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("verifier_jwks_fetches_total",
        "status" => status
    )
    .increment(1);
}

/// Record a signing key cache lookup.
///
/// Metric: `verifier_jwks_cache_lookups_total`
/// Labels: `result` (hit, miss, refresh)
pub fn record_jwks_cache_lookup(result: &'static str) {
    counter!("verifier_jwks_cache_lookups_total",
        "result" => result
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
