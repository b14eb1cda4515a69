//! Request metrics for every route.
//!
//! Runs outside the auth middleware and the router fallback, so 401/500/503
//! from authentication and 404/405 from routing are all counted.

use crate::observability::metrics::record_http_request;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Records method, normalized path, status and latency of each response.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}
