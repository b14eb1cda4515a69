//! HTTP routes for the verifier service.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwksClient, JwtValidator, SigningKeyProvider};
use crate::config::{Config, MAX_DISCOVERY_TIMEOUT_SECONDS};
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Overall bound on one request, including a cold-cache discovery fetch.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// A discovery timeout must fire before the request timeout, or a slow
// identity provider would be reported as 408 instead of 503.
const _: () = assert!(MAX_DISCOVERY_TIMEOUT_SECONDS < REQUEST_TIMEOUT.as_secs());

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Arc<Config>,

    /// Source of per-tenant signing keys.
    pub key_provider: Arc<dyn SigningKeyProvider>,
}

impl AppState {
    /// State backed by a discovery-based [`JwksClient`].
    pub fn new(config: Config) -> Self {
        let key_provider = Arc::new(JwksClient::from_config(&config));
        Self::with_key_provider(config, key_provider)
    }

    /// State with an explicit key provider.
    pub fn with_key_provider(config: Config, key_provider: Arc<dyn SigningKeyProvider>) -> Self {
        Self {
            config: Arc::new(config),
            key_provider,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness check (simple "OK") - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/SecureFunction` - Caller identity - bearer token required
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        config: Arc::clone(&state.config),
        key_provider: Arc::clone(&state.key_provider),
        validator: JwtValidator::new(state.config.jwt_clock_skew_seconds),
    });

    // Public routes (no authentication required)
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (bearer token required)
    let protected_routes = Router::new()
        .route("/api/SecureFunction", get(handlers::get_identity))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(middleware::from_fn(http_metrics_middleware))
}
