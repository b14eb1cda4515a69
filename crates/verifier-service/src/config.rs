//! Verifier service configuration.
//!
//! Configuration is loaded from environment variables. The trust policy
//! inputs (`AZUREAD_TENANT_ID`, `AZUREAD_AUDIENCE`) are deliberately optional
//! here: their absence is reported per request as a configuration fault
//! (HTTP 500) rather than preventing startup.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default identity provider authority (Microsoft identity platform).
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";

/// Placeholder substituted with the tenant id in the issuer template.
pub const TENANT_PLACEHOLDER: &str = "{tenantId}";

/// Placeholder substituted with the validator detail in `MSG_INVALID_TOKEN`.
pub const DETAIL_PLACEHOLDER: &str = "{detail}";

/// Default bound on a discovery + JWKS fetch, in seconds.
pub const DEFAULT_DISCOVERY_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for `DISCOVERY_TIMEOUT_SECONDS`.
///
/// Must stay below the overall request timeout so an unreachable identity
/// provider surfaces as 503 rather than a request timeout.
pub const MAX_DISCOVERY_TIMEOUT_SECONDS: u64 = 25;

/// Default signing key cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Operator-facing diagnostic texts returned in non-200 response bodies.
///
/// These are presentation, not contract: every message can be replaced via
/// environment variables to localize the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessages {
    /// 401 body when no usable bearer token was sent.
    pub missing_authorization: String,

    /// 500 body when the trust policy is incomplete.
    pub incomplete_configuration: String,

    /// 503 body when the identity provider cannot be reached.
    pub discovery_unavailable: String,

    /// 401 body template for rejected tokens; must contain `{detail}`.
    pub invalid_token: String,
}

impl Default for DiagnosticMessages {
    fn default() -> Self {
        Self {
            missing_authorization: "Authorization header missing or malformed.".to_string(),
            incomplete_configuration: "Identity provider configuration is incomplete."
                .to_string(),
            discovery_unavailable: "Identity provider signing keys are unavailable."
                .to_string(),
            invalid_token: format!("Invalid token: {DETAIL_PLACEHOLDER}"),
        }
    }
}

impl DiagnosticMessages {
    /// Render the invalid-token template with the validator's detail.
    pub fn render_invalid_token(&self, detail: &str) -> String {
        self.invalid_token.replace(DETAIL_PLACEHOLDER, detail)
    }
}

/// Verifier service configuration.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Identity provider tenant id. `None` is a per-request configuration fault.
    pub tenant_id: Option<String>,

    /// Expected token audience. `None` is a per-request configuration fault.
    pub audience: Option<String>,

    /// Identity provider authority; discovery lives under
    /// `<authority>/<tenant>/v2.0/.well-known/openid-configuration`.
    pub authority_url: String,

    /// Expected issuer with `{tenantId}` placeholders.
    pub issuer_template: String,

    /// Upper bound for one discovery + JWKS fetch.
    pub discovery_timeout_seconds: u64,

    /// How long a tenant's signing keys are served from cache.
    pub jwks_cache_ttl_seconds: u64,

    /// JWT clock skew tolerance in seconds for lifetime validation.
    pub jwt_clock_skew_seconds: i64,

    /// Response body texts.
    pub messages: DiagnosticMessages,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid identity provider authority URL: {0}")]
    InvalidAuthorityUrl(String),

    #[error("Invalid discovery timeout configuration: {0}")]
    InvalidDiscoveryTimeout(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidJwksCacheTtl(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid message template: {0}")]
    InvalidMessageTemplate(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let tenant_id = vars.get("AZUREAD_TENANT_ID").cloned();
        let audience = vars.get("AZUREAD_AUDIENCE").cloned();

        let authority_url = vars
            .get("IDP_AUTHORITY_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_AUTHORITY_URL.to_string());

        if !(authority_url.starts_with("https://") || authority_url.starts_with("http://")) {
            return Err(ConfigError::InvalidAuthorityUrl(format!(
                "IDP_AUTHORITY_URL must be an http(s) URL, got '{}'",
                authority_url
            )));
        }

        let issuer_template = vars
            .get("IDP_ISSUER_TEMPLATE")
            .cloned()
            .unwrap_or_else(|| format!("{}/{}/v2.0", authority_url, TENANT_PLACEHOLDER));

        // Parse discovery timeout with validation
        let discovery_timeout_seconds =
            if let Some(value_str) = vars.get("DISCOVERY_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidDiscoveryTimeout(format!(
                        "DISCOVERY_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidDiscoveryTimeout(
                        "DISCOVERY_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }

                if value > MAX_DISCOVERY_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidDiscoveryTimeout(format!(
                        "DISCOVERY_TIMEOUT_SECONDS must not exceed {} seconds, got {}",
                        MAX_DISCOVERY_TIMEOUT_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_DISCOVERY_TIMEOUT_SECONDS
            };

        // Parse JWKS cache TTL with validation
        let jwks_cache_ttl_seconds = if let Some(value_str) = vars.get("JWKS_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwksCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwksCacheTtl(
                    "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_JWKS_CACHE_TTL_SECONDS
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value < 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not be negative, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let defaults = DiagnosticMessages::default();
        let message = |name: &str, default: String| vars.get(name).cloned().unwrap_or(default);
        let messages = DiagnosticMessages {
            missing_authorization: message(
                "MSG_MISSING_AUTHORIZATION",
                defaults.missing_authorization,
            ),
            incomplete_configuration: message(
                "MSG_INCOMPLETE_CONFIGURATION",
                defaults.incomplete_configuration,
            ),
            discovery_unavailable: message(
                "MSG_DISCOVERY_UNAVAILABLE",
                defaults.discovery_unavailable,
            ),
            invalid_token: message("MSG_INVALID_TOKEN", defaults.invalid_token),
        };

        if !messages.invalid_token.contains(DETAIL_PLACEHOLDER) {
            return Err(ConfigError::InvalidMessageTemplate(format!(
                "MSG_INVALID_TOKEN must contain the {} placeholder",
                DETAIL_PLACEHOLDER
            )));
        }

        Ok(Config {
            bind_address,
            tenant_id,
            audience,
            authority_url,
            issuer_template,
            discovery_timeout_seconds,
            jwks_cache_ttl_seconds,
            jwt_clock_skew_seconds,
            messages,
        })
    }

    /// Discovery + JWKS fetch bound as a `Duration`.
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_seconds)
    }

    /// Signing key cache TTL as a `Duration`.
    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }
}
