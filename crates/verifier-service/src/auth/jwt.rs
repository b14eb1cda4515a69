//! Token validation against a tenant's signing keys and a trust policy.
//!
//! Validation is synchronous and pure apart from reading the clock: given a
//! raw token, a [`TrustPolicy`] and a [`SigningKeySet`] it always yields the
//! same [`ValidationOutcome`].
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - `alg: none`, unknown and symmetric (HS*) algorithms are never accepted
//! - The key's type, curve and published `alg` must match the header `alg`
//! - The signature is verified before any claim is looked at
//! - Failure details are safe to return to clients

use crate::auth::claims::ClaimSet;
use crate::auth::jwks::SigningKeySet;
use crate::auth::policy::TrustPolicy;
use common::jwt::{
    audience_contains, parse_compact, validate_lifetime_at, JwtValidationError, LifetimeClaims,
};
use jsonwebtoken::{decode, Validation};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// The first validation step a token failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationFailureKind {
    Malformed,
    UnknownSigningKey,
    InvalidSignature,
    Expired,
    NotYetValid,
    IssuerMismatch,
    AudienceMismatch,
}

impl ValidationFailureKind {
    /// Stable snake_case label for logs and metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ValidationFailureKind::Malformed => "malformed",
            ValidationFailureKind::UnknownSigningKey => "unknown_signing_key",
            ValidationFailureKind::InvalidSignature => "invalid_signature",
            ValidationFailureKind::Expired => "expired",
            ValidationFailureKind::NotYetValid => "not_yet_valid",
            ValidationFailureKind::IssuerMismatch => "issuer_mismatch",
            ValidationFailureKind::AudienceMismatch => "audience_mismatch",
        }
    }
}

impl fmt::Display for ValidationFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Why a token was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub kind: ValidationFailureKind,

    /// Client-safe description; never contains token bytes or key material.
    pub detail: String,
}

impl ValidationFailure {
    fn new(kind: ValidationFailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Result of validating one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid(ClaimSet),
    Rejected(ValidationFailure),
}

impl ValidationOutcome {
    /// Metric/log label: `valid` or the failure kind.
    pub fn label(&self) -> &'static str {
        match self {
            ValidationOutcome::Valid(_) => "valid",
            ValidationOutcome::Rejected(failure) => failure.kind.as_label(),
        }
    }
}

impl From<JwtValidationError> for ValidationFailure {
    fn from(err: JwtValidationError) -> Self {
        let kind = match err {
            JwtValidationError::TokenTooLarge | JwtValidationError::MalformedToken(_) => {
                ValidationFailureKind::Malformed
            }
            JwtValidationError::MissingExpiration
            | JwtValidationError::InvalidNumericDate("exp")
            | JwtValidationError::Expired { .. } => ValidationFailureKind::Expired,
            JwtValidationError::InvalidNumericDate(_) | JwtValidationError::NotYetValid { .. } => {
                ValidationFailureKind::NotYetValid
            }
        };
        Self::new(kind, err.to_string())
    }
}

/// Bearer token validator.
#[derive(Debug, Clone)]
pub struct JwtValidator {
    /// Clock skew tolerance for `exp`/`nbf`.
    clock_skew: Duration,
}

impl JwtValidator {
    /// Create a new validator.
    ///
    /// # Arguments
    ///
    /// * `clock_skew_seconds` - Tolerance for `exp`/`nbf`; negative values are treated as 0
    pub fn new(clock_skew_seconds: i64) -> Self {
        Self {
            clock_skew: Duration::from_secs(u64::try_from(clock_skew_seconds).unwrap_or(0)),
        }
    }

    /// Validate a token against the current wall clock.
    pub fn validate(
        &self,
        raw_token: &str,
        policy: &TrustPolicy,
        keys: &SigningKeySet,
    ) -> ValidationOutcome {
        self.validate_at(raw_token, policy, keys, chrono::Utc::now().timestamp())
    }

    /// Validate a token at an explicit Unix timestamp.
    ///
    /// Steps, reporting the first failure:
    ///
    /// 1. Structure (size, segments, JSON header and payload)
    /// 2. Key resolution by `kid` (exactly one match)
    /// 3. Signature (key compatibility, then cryptographic check)
    /// 4. Lifetime (`exp` required and numeric, then `nbf`)
    /// 5. Issuer
    /// 6. Audience
    pub fn validate_at(
        &self,
        raw_token: &str,
        policy: &TrustPolicy,
        keys: &SigningKeySet,
        now: i64,
    ) -> ValidationOutcome {
        match self.check(raw_token, policy, keys, now) {
            Ok(claims) => ValidationOutcome::Valid(claims),
            Err(failure) => {
                tracing::debug!(
                    target: "verifier.auth.jwt",
                    kind = %failure.kind,
                    detail = %failure.detail,
                    "Token rejected"
                );
                ValidationOutcome::Rejected(failure)
            }
        }
    }

    fn check(
        &self,
        raw_token: &str,
        policy: &TrustPolicy,
        keys: &SigningKeySet,
        now: i64,
    ) -> Result<ClaimSet, ValidationFailure> {
        // 1. Structure
        let jwt = parse_compact(raw_token)?;
        let alg = jwt.header.alg;

        // 2. Key resolution
        let kid = jwt.kid().ok_or_else(|| {
            ValidationFailure::new(
                ValidationFailureKind::UnknownSigningKey,
                "token header has no key id",
            )
        })?;

        let key = keys.resolve(kid).ok_or_else(|| {
            ValidationFailure::new(
                ValidationFailureKind::UnknownSigningKey,
                "signing key not found for the token's key id",
            )
        })?;

        // 3. Signature
        if !key.supports(alg) {
            tracing::debug!(
                target: "verifier.auth.jwt",
                kid = %key.kid(),
                alg = ?alg,
                "Signing key does not support token algorithm"
            );
            return Err(ValidationFailure::new(
                ValidationFailureKind::InvalidSignature,
                "token algorithm does not match the signing key",
            ));
        }

        // Claims are checked below with the configured skew
        let mut validation = Validation::new(alg);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        decode::<Value>(jwt.raw(), key.decoding_key(), &validation).map_err(|e| {
            tracing::debug!(target: "verifier.auth.jwt", error = %e, "Signature verification failed");
            ValidationFailure::new(
                ValidationFailureKind::InvalidSignature,
                "signature verification failed",
            )
        })?;

        // 4. Lifetime
        let lifetime = LifetimeClaims::from_claims(&jwt.claims)?;
        validate_lifetime_at(lifetime.exp, lifetime.nbf, self.clock_skew, now)?;

        // 5. Issuer
        let issuer = jwt.claims.get("iss").and_then(Value::as_str);
        if issuer != Some(policy.issuer()) {
            return Err(ValidationFailure::new(
                ValidationFailureKind::IssuerMismatch,
                "token issuer is not trusted",
            ));
        }

        // 6. Audience
        if !audience_contains(jwt.claims.get("aud"), policy.audience()) {
            return Err(ValidationFailure::new(
                ValidationFailureKind::AudienceMismatch,
                "token audience does not include this API",
            ));
        }

        Ok(ClaimSet::from_payload(&jwt.claims))
    }
}
