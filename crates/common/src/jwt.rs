//! JWT utilities shared across the bearer verifier crates.
//!
//! This module provides the protocol-level pieces of token validation that do
//! not depend on key material:
//! - Size limits for DoS prevention
//! - Clock skew constants for lifetime validation
//! - Structural parsing of compact JWTs (header, claims, signing input)
//! - `exp`/`nbf` lifetime validation
//! - `aud` membership checks (single value or list)
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - `alg: none` and unknown algorithms are rejected at parse time
//! - Parsing does NOT verify the signature; callers must verify before
//!   trusting anything in [`CompactJwt::claims`]
//! - Error messages never echo token bytes
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{parse_compact, validate_lifetime, LifetimeClaims, DEFAULT_CLOCK_SKEW};
//!
//! let jwt = parse_compact(token)?;
//! let kid = jwt.kid();
//! // ... resolve the key and verify the signature ...
//! let lifetime = LifetimeClaims::from_claims(&jwt.claims)?;
//! validate_lifetime(lifetime.exp, lifetime.nbf, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Header;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any base64 decoding or
/// cryptographic operation.
///
/// # Rationale
///
/// - Typical identity-provider access tokens are 1-2KB (RS256 signature plus
///   a few dozen claims)
/// - 8KB leaves room for group-heavy tokens while bounding allocation
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance.
///
/// Lifetime checks are exact unless the operator configures a tolerance.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(0);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Prevents misconfiguration from turning lifetime validation into a no-op.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced by the key-independent validation steps.
///
/// The `Display` text is safe to return to clients: it describes the failed
/// condition without including any part of the token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("token exceeds the maximum allowed size of {MAX_JWT_SIZE_BYTES} bytes")]
    TokenTooLarge,

    /// Token format is invalid (not a valid compact JWT).
    #[error("token is not a well-formed JWT: {0}")]
    MalformedToken(&'static str),

    /// Token has no `exp` claim.
    #[error("token has no exp claim")]
    MissingExpiration,

    /// A lifetime claim is present but is not a `NumericDate`.
    #[error("{0} claim is not a numeric date")]
    InvalidNumericDate(&'static str),

    /// Token `exp` is in the past (beyond clock skew).
    #[error("token expired at {exp} (unix time)")]
    Expired {
        /// The `exp` claim of the rejected token.
        exp: i64,
    },

    /// Token `nbf` is in the future (beyond clock skew).
    #[error("token is not valid before {nbf} (unix time)")]
    NotYetValid {
        /// The `nbf` claim of the rejected token.
        nbf: i64,
    },
}

// =============================================================================
// Parsed Token
// =============================================================================

/// A structurally valid, NOT yet verified, compact JWT.
///
/// Borrowing the raw token keeps the signing input and signature segments
/// available for verification without copying.
#[derive(Debug, Clone)]
pub struct CompactJwt<'a> {
    /// Decoded JOSE header.
    pub header: Header,

    /// Decoded claims object, in token order.
    pub claims: Map<String, Value>,

    token: &'a str,
}

impl CompactJwt<'_> {
    /// Key identifier from the header, if present and non-empty.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref().filter(|kid| !kid.is_empty())
    }

    /// The raw token this was parsed from (for signature verification).
    #[must_use]
    pub fn raw(&self) -> &str {
        self.token
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Lifetime claims read from a verified payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifetimeClaims {
    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Optional not-before timestamp (Unix epoch seconds).
    pub nbf: Option<i64>,
}

impl LifetimeClaims {
    /// Read `exp` (required) and `nbf` (optional) from a claims object.
    ///
    /// Call only after the signature has been verified: a missing `exp` is a
    /// lifetime failure, not a structural one.
    ///
    /// # Errors
    ///
    /// - `MissingExpiration` - no `exp` claim
    /// - `InvalidNumericDate` - `exp` or `nbf` present but not numeric
    pub fn from_claims(claims: &Map<String, Value>) -> Result<Self, JwtValidationError> {
        let exp = claims
            .get("exp")
            .ok_or(JwtValidationError::MissingExpiration)
            .and_then(|value| {
                numeric_date(value).ok_or(JwtValidationError::InvalidNumericDate("exp"))
            })?;

        let nbf = claims
            .get("nbf")
            .map(|value| numeric_date(value).ok_or(JwtValidationError::InvalidNumericDate("nbf")))
            .transpose()?;

        Ok(Self { exp, nbf })
    }
}

/// Parse a compact JWT without verifying its signature.
///
/// Only structure is checked here; claim contents (including `exp`) are left
/// to the caller so that key resolution and the signature come first.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - Nothing in the returned claims may be trusted until the signature has
///   been verified against a trusted key
///
/// # Errors
///
/// Returns `JwtValidationError` variants:
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong segment count, empty segment, bad base64url,
///   header not a JOSE header with a supported `alg`, claims not a JSON object
pub fn parse_compact(token: &str) -> Result<CompactJwt<'_>, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(payload_part), Some(signature_part), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: expected three segments");
        return Err(JwtValidationError::MalformedToken(
            "expected three dot-separated segments",
        ));
    };

    if header_part.is_empty() || payload_part.is_empty() || signature_part.is_empty() {
        return Err(JwtValidationError::MalformedToken("empty segment"));
    }

    let header_bytes = decode_segment(header_part, "header is not valid base64url")?;
    let header: Header = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header");
        JwtValidationError::MalformedToken("header is not a JOSE header with a supported alg")
    })?;

    let payload_bytes = decode_segment(payload_part, "payload is not valid base64url")?;
    let claims: Map<String, Value> = serde_json::from_slice(&payload_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT payload");
        JwtValidationError::MalformedToken("payload is not a JSON object")
    })?;

    decode_segment(signature_part, "signature is not valid base64url")?;

    Ok(CompactJwt {
        header,
        claims,
        token,
    })
}

fn decode_segment(segment: &str, reason: &'static str) -> Result<Vec<u8>, JwtValidationError> {
    URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, reason, "Failed to decode JWT segment");
        JwtValidationError::MalformedToken(reason)
    })
}

/// RFC 7519 `NumericDate`: integral or fractional seconds, truncated.
#[allow(clippy::cast_possible_truncation)]
fn numeric_date(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// Validate `exp`/`nbf` against the current wall clock.
///
/// # Errors
///
/// - `Expired` if now is later than `exp + clock_skew`
/// - `NotYetValid` if now is earlier than `nbf - clock_skew`
pub fn validate_lifetime(
    exp: i64,
    nbf: Option<i64>,
    clock_skew: Duration,
) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_lifetime_at(exp, nbf, clock_skew, now)
}

/// Deterministic lifetime validation against an explicit `now` timestamp.
///
/// Prefer [`validate_lifetime`] in production code. This variant exists so
/// that boundary conditions can be tested without wall-clock dependence.
/// Both bounds are inclusive: a token is valid at exactly `exp` and exactly
/// `nbf`. Expiry is reported before not-before.
///
/// # Errors
///
/// Same as [`validate_lifetime`].
pub fn validate_lifetime_at(
    exp: i64,
    nbf: Option<i64>,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds), well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;

    if now > exp.saturating_add(clock_skew_secs) {
        tracing::debug!(
            target: "common.jwt",
            exp = exp,
            now = now,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: expired"
        );
        return Err(JwtValidationError::Expired { exp });
    }

    if let Some(nbf) = nbf {
        if now < nbf.saturating_sub(clock_skew_secs) {
            tracing::debug!(
                target: "common.jwt",
                nbf = nbf,
                now = now,
                clock_skew_secs = clock_skew_secs,
                "Token rejected: not yet valid"
            );
            return Err(JwtValidationError::NotYetValid { nbf });
        }
    }

    Ok(())
}

/// Check whether an `aud` claim contains the expected audience.
///
/// `aud` may be a single string or an array of strings (RFC 7519 §4.1.3).
/// Non-string array members are ignored; any other shape never matches.
#[must_use]
pub fn audience_contains(aud: Option<&Value>, expected: &str) -> bool {
    match aud {
        Some(Value::String(single)) => single == expected,
        Some(Value::Array(values)) => values
            .iter()
            .any(|value| value.as_str() == Some(expected)),
        _ => false,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_json(value: &Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    fn token_with(header: &Value, payload: &Value) -> String {
        format!(
            "{}.{}.{}",
            encode_json(header),
            encode_json(payload),
            URL_SAFE_NO_PAD.encode(b"signature")
        )
    }

    fn default_header() -> Value {
        json!({"alg": "RS256", "typ": "JWT", "kid": "test-key-01"})
    }

    // -------------------------------------------------------------------------
    // Constants Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_default_clock_skew_is_zero() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(0));
    }

    #[test]
    fn test_max_clock_skew_is_10_minutes() {
        assert_eq!(MAX_CLOCK_SKEW, Duration::from_secs(600));
    }

    // -------------------------------------------------------------------------
    // parse_compact Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_valid_token() {
        let token = token_with(
            &default_header(),
            &json!({"sub": "abc", "exp": 1_700_000_000, "nbf": 1_600_000_000}),
        );

        let jwt = parse_compact(&token).unwrap();
        assert_eq!(jwt.kid(), Some("test-key-01"));
        assert_eq!(jwt.header.alg, jsonwebtoken::Algorithm::RS256);
        assert_eq!(jwt.claims.get("sub"), Some(&json!("abc")));
        assert_eq!(jwt.raw(), token);
    }

    #[test]
    fn test_parse_preserves_claim_order() {
        let payload = r#"{"zeta":"1","alpha":"2","exp":1700000000}"#;
        let token = format!(
            "{}.{}.{}",
            encode_json(&default_header()),
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(b"sig")
        );

        let jwt = parse_compact(&token).unwrap();
        let keys: Vec<&str> = jwt.claims.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "exp"]);
    }

    #[test]
    fn test_parse_does_not_inspect_lifetime_claims() {
        for payload in [
            json!({"sub": "abc"}),
            json!({"exp": "tomorrow"}),
            json!({"exp": 1, "nbf": "now"}),
        ] {
            let token = token_with(&default_header(), &payload);
            assert!(parse_compact(&token).is_ok(), "payload {payload}");
        }
    }

    #[test]
    fn test_parse_missing_kid_is_not_a_parse_error() {
        let token = token_with(&json!({"alg": "RS256"}), &json!({"exp": 1}));
        let jwt = parse_compact(&token).unwrap();
        assert_eq!(jwt.kid(), None);
    }

    #[test]
    fn test_parse_empty_kid_reads_as_absent() {
        let token = token_with(&json!({"alg": "RS256", "kid": ""}), &json!({"exp": 1}));
        assert_eq!(parse_compact(&token).unwrap().kid(), None);
    }

    #[test]
    fn test_parse_wrong_segment_count() {
        for token in ["", "single", "only.two", "not.a.valid.jwt.format"] {
            assert!(
                matches!(parse_compact(token), Err(JwtValidationError::MalformedToken(_))),
                "expected malformed for {token:?}"
            );
        }
    }

    #[test]
    fn test_parse_empty_segment() {
        let token = format!(".{}.sig", encode_json(&json!({"exp": 1})));
        assert_eq!(
            parse_compact(&token).unwrap_err(),
            JwtValidationError::MalformedToken("empty segment")
        );
    }

    #[test]
    fn test_parse_invalid_base64_header() {
        let result = parse_compact("!!!invalid!!!.payload.signature");
        assert!(matches!(result, Err(JwtValidationError::MalformedToken(_))));
    }

    #[test]
    fn test_parse_header_not_json() {
        let token = format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode("not-json"),
            encode_json(&json!({"exp": 1}))
        );
        assert!(matches!(
            parse_compact(&token),
            Err(JwtValidationError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_parse_rejects_alg_none() {
        let token = token_with(&json!({"alg": "none", "kid": "k"}), &json!({"exp": 1}));
        assert!(matches!(
            parse_compact(&token),
            Err(JwtValidationError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_parse_payload_not_object() {
        let token = token_with(&default_header(), &json!(["exp", 1]));
        assert_eq!(
            parse_compact(&token).unwrap_err(),
            JwtValidationError::MalformedToken("payload is not a JSON object")
        );
    }

    #[test]
    fn test_parse_invalid_signature_encoding() {
        let token = format!(
            "{}.{}.***",
            encode_json(&default_header()),
            encode_json(&json!({"exp": 1}))
        );
        assert_eq!(
            parse_compact(&token).unwrap_err(),
            JwtValidationError::MalformedToken("signature is not valid base64url")
        );
    }

    #[test]
    fn test_parse_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            parse_compact(&oversized).unwrap_err(),
            JwtValidationError::TokenTooLarge
        );
    }

    #[test]
    fn test_parse_at_size_limit() {
        let header_b64 = encode_json(&default_header());
        // Grow a padding claim until the leftover space is a valid base64url length.
        let mut pad_len = 0;
        loop {
            let payload = encode_json(&json!({"exp": 1, "pad": "x".repeat(pad_len)}));
            let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - payload.len() - 2;
            if remaining % 4 != 1 {
                let token = format!("{header_b64}.{payload}.{}", "A".repeat(remaining));
                assert_eq!(
                    token.len(),
                    MAX_JWT_SIZE_BYTES,
                    "Token should be exactly at size limit"
                );
                assert!(parse_compact(&token).is_ok(), "Token at size limit should be accepted");

                let oversized = format!("{token}A");
                assert_eq!(
                    parse_compact(&oversized).unwrap_err(),
                    JwtValidationError::TokenTooLarge
                );
                break;
            }
            pad_len += 1;
        }
    }

    #[test]
    fn test_error_messages_do_not_echo_token() {
        let token = "secret-looking-token-value";
        let err = parse_compact(token).unwrap_err();
        assert!(!err.to_string().contains(token));
    }

    // -------------------------------------------------------------------------
    // LifetimeClaims Tests
    // -------------------------------------------------------------------------

    fn lifetime(payload: Value) -> Result<LifetimeClaims, JwtValidationError> {
        LifetimeClaims::from_claims(payload.as_object().unwrap())
    }

    #[test]
    fn test_lifetime_claims_read_exp_and_nbf() {
        assert_eq!(
            lifetime(json!({"exp": 1_700_000_000, "nbf": 1_600_000_000})).unwrap(),
            LifetimeClaims {
                exp: 1_700_000_000,
                nbf: Some(1_600_000_000)
            }
        );
        assert_eq!(lifetime(json!({"exp": 5})).unwrap().nbf, None);
    }

    #[test]
    fn test_lifetime_claims_fractional_exp_is_truncated() {
        assert_eq!(
            lifetime(json!({"exp": 1_700_000_000.75})).unwrap().exp,
            1_700_000_000
        );
    }

    #[test]
    fn test_lifetime_claims_require_exp() {
        assert_eq!(
            lifetime(json!({"sub": "abc"})).unwrap_err(),
            JwtValidationError::MissingExpiration
        );
    }

    #[test]
    fn test_lifetime_claims_reject_string_exp() {
        assert_eq!(
            lifetime(json!({"exp": "tomorrow"})).unwrap_err(),
            JwtValidationError::InvalidNumericDate("exp")
        );
    }

    #[test]
    fn test_lifetime_claims_reject_string_nbf() {
        assert_eq!(
            lifetime(json!({"exp": 1, "nbf": "now"})).unwrap_err(),
            JwtValidationError::InvalidNumericDate("nbf")
        );
    }

    // -------------------------------------------------------------------------
    // validate_lifetime Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_lifetime_current_token() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_lifetime(now + 3600, Some(now - 60), DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_lifetime_expired() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(
            validate_lifetime(now - 3600, None, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::Expired { exp: now - 3600 })
        );
    }

    #[test]
    fn test_validate_lifetime_at_exp_boundary() {
        let now = 1_700_000_000_i64;

        // exp == now is the last accepted instant
        assert!(validate_lifetime_at(now, None, DEFAULT_CLOCK_SKEW, now).is_ok());

        // exp == now - 1 is the first rejected value
        assert_eq!(
            validate_lifetime_at(now - 1, None, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::Expired { exp: now - 1 })
        );
    }

    #[test]
    fn test_validate_lifetime_at_exp_with_skew() {
        let now = 1_700_000_000_i64;
        let skew = Duration::from_secs(300);

        assert!(validate_lifetime_at(now - 300, None, skew, now).is_ok());
        assert!(matches!(
            validate_lifetime_at(now - 301, None, skew, now),
            Err(JwtValidationError::Expired { .. })
        ));
    }

    #[test]
    fn test_validate_lifetime_at_nbf_boundary() {
        let now = 1_700_000_000_i64;

        assert!(validate_lifetime_at(now + 3600, Some(now), DEFAULT_CLOCK_SKEW, now).is_ok());
        assert_eq!(
            validate_lifetime_at(now + 3600, Some(now + 1), DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::NotYetValid { nbf: now + 1 })
        );
    }

    #[test]
    fn test_validate_lifetime_at_nbf_with_skew() {
        let now = 1_700_000_000_i64;
        let skew = Duration::from_secs(60);

        assert!(validate_lifetime_at(now + 3600, Some(now + 60), skew, now).is_ok());
        assert!(matches!(
            validate_lifetime_at(now + 3600, Some(now + 61), skew, now),
            Err(JwtValidationError::NotYetValid { .. })
        ));
    }

    #[test]
    fn test_validate_lifetime_reports_expiry_before_not_before() {
        let now = 1_700_000_000_i64;
        assert!(matches!(
            validate_lifetime_at(now - 10, Some(now + 10), DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::Expired { .. })
        ));
    }

    #[test]
    fn test_validate_lifetime_extreme_values_do_not_overflow() {
        let skew = MAX_CLOCK_SKEW;
        assert!(validate_lifetime_at(i64::MAX, Some(i64::MIN), skew, 0).is_ok());
    }

    // -------------------------------------------------------------------------
    // audience_contains Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_audience_single_value() {
        assert!(audience_contains(Some(&json!("api://app")), "api://app"));
        assert!(!audience_contains(Some(&json!("api://other")), "api://app"));
    }

    #[test]
    fn test_audience_list_contains_expected() {
        let aud = json!(["api://other", "api://app", "https://graph"]);
        assert!(audience_contains(Some(&aud), "api://app"));
    }

    #[test]
    fn test_audience_list_without_expected() {
        let aud = json!(["api://other", 42, null]);
        assert!(!audience_contains(Some(&aud), "api://app"));
    }

    #[test]
    fn test_audience_missing_or_wrong_shape() {
        assert!(!audience_contains(None, "api://app"));
        assert!(!audience_contains(Some(&json!(42)), "api://app"));
        assert!(!audience_contains(Some(&json!({"aud": "api://app"})), "api://app"));
    }

    #[test]
    fn test_audience_is_case_sensitive() {
        assert!(!audience_contains(Some(&json!("API://APP")), "api://app"));
    }
}
