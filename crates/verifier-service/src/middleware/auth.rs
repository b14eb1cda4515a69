//! Authentication middleware for the verifier endpoint.
//!
//! Extracts the bearer token from the Authorization header, builds the trust
//! policy from configuration, resolves the tenant's signing keys, validates
//! the token and injects the verified [`ClaimSet`] into request extensions.

use crate::auth::{
    ClaimSet, JwtValidator, SigningKeyProvider, TrustPolicy, ValidationFailureKind,
    ValidationOutcome,
};
use crate::config::Config;
use crate::errors::VerifierError;
use crate::observability::metrics;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Minimum key-set age before an unknown `kid` triggers a forced refresh.
pub const KEY_ROTATION_COOLDOWN: Duration = Duration::from_secs(60);

/// Scheme prefix required on the Authorization header (case-sensitive).
const BEARER_PREFIX: &str = "Bearer ";

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Service configuration (trust policy inputs and response texts).
    pub config: Arc<Config>,

    /// Source of per-tenant signing keys.
    pub key_provider: Arc<dyn SigningKeyProvider>,

    /// Token validator.
    pub validator: JwtValidator,
}

/// Extract the bearer token from the first Authorization header value.
///
/// Returns `None` unless the value starts with exactly `"Bearer "` and has a
/// non-empty remainder.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .filter(|token| !token.is_empty())
}

/// Authentication middleware that validates bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 401 with `WWW-Authenticate` if the token is missing or rejected
/// - 500 if the trust policy is incomplete (no key lookup happens)
/// - 503 if the tenant's signing keys cannot be obtained
/// - Continues to next handler with the claim set in extensions otherwise
#[instrument(skip(state, req, next), name = "verifier.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, VerifierError> {
    let messages = &state.config.messages;

    let Some(token) = extract_bearer_token(req.headers()) else {
        tracing::warn!(target: "verifier.middleware.auth", "Missing or malformed Authorization header");
        return Err(VerifierError::MissingCredentials(
            messages.missing_authorization.clone(),
        ));
    };

    let policy = TrustPolicy::from_config(&state.config).map_err(|e| {
        tracing::error!(target: "verifier.middleware.auth", error = %e, "Trust policy configuration incomplete");
        VerifierError::Configuration(messages.incomplete_configuration.clone())
    })?;

    let claims = authenticate(&state, token, &policy).await?;

    tracing::debug!(target: "verifier.middleware.auth", claim_count = claims.len(), "Request authenticated");

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Resolve keys and validate, retrying once on an unknown key after a refresh.
async fn authenticate(
    state: &AuthState,
    token: &str,
    policy: &TrustPolicy,
) -> Result<ClaimSet, VerifierError> {
    let messages = &state.config.messages;
    let unavailable = |_| VerifierError::SigningKeysUnavailable(messages.discovery_unavailable.clone());

    let keys = state
        .key_provider
        .signing_keys(policy.tenant_id())
        .await
        .map_err(unavailable)?;

    let start = Instant::now();
    let mut outcome = state.validator.validate(token, policy, &keys);

    if is_unknown_key(&outcome) && key_set_age(keys.fetched_at()) >= KEY_ROTATION_COOLDOWN {
        tracing::info!(
            target: "verifier.middleware.auth",
            tenant_id = %policy.tenant_id(),
            "Unknown signing key, refreshing key set"
        );

        match state.key_provider.refresh_signing_keys(policy.tenant_id()).await {
            Ok(refreshed) => outcome = state.validator.validate(token, policy, &refreshed),
            Err(e) => {
                // Keep the rejection from the key set already in hand
                tracing::warn!(target: "verifier.middleware.auth", error = %e, "Key set refresh failed");
            }
        }
    }

    metrics::record_token_validation(outcome.label(), start.elapsed());

    match outcome {
        ValidationOutcome::Valid(claims) => Ok(claims),
        ValidationOutcome::Rejected(failure) => {
            tracing::warn!(
                target: "verifier.middleware.auth",
                kind = %failure.kind,
                detail = %failure.detail,
                "Token rejected"
            );
            Err(VerifierError::InvalidToken(
                messages.render_invalid_token(&failure.detail),
            ))
        }
    }
}

fn is_unknown_key(outcome: &ValidationOutcome) -> bool {
    matches!(
        outcome,
        ValidationOutcome::Rejected(failure)
            if failure.kind == ValidationFailureKind::UnknownSigningKey
    )
}

fn key_set_age(fetched_at: chrono::DateTime<chrono::Utc>) -> Duration {
    chrono::Utc::now()
        .signed_duration_since(fetched_at)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
