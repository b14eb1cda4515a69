//! Trust policy: which tenant's keys to trust and which issuer/audience a
//! token must carry.

use crate::config::{Config, TENANT_PLACEHOLDER};
use thiserror::Error;

/// Reasons a trust policy cannot be built from configuration.
///
/// Every variant is a configuration fault, never an authentication failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("tenant id is not configured")]
    MissingTenantId,

    #[error("audience is not configured")]
    MissingAudience,

    #[error("tenant id contains characters outside [A-Za-z0-9._-]")]
    InvalidTenantId,
}

/// Issuer/audience trust policy for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustPolicy {
    tenant_id: String,
    audience: String,
    issuer: String,
}

impl TrustPolicy {
    /// Build a policy, rendering every `{tenantId}` in `issuer_template`.
    ///
    /// Tenant id and audience are trimmed; empty values are faults.
    pub fn new(
        tenant_id: Option<&str>,
        audience: Option<&str>,
        issuer_template: &str,
    ) -> Result<Self, PolicyError> {
        let tenant_id = tenant_id
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(PolicyError::MissingTenantId)?;

        let audience = audience
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(PolicyError::MissingAudience)?;

        // Tenant id is substituted into discovery URLs
        if !tenant_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
        {
            return Err(PolicyError::InvalidTenantId);
        }

        Ok(Self {
            tenant_id: tenant_id.to_string(),
            audience: audience.to_string(),
            issuer: issuer_template.replace(TENANT_PLACEHOLDER, tenant_id),
        })
    }

    /// Build the policy from the service configuration.
    pub fn from_config(config: &Config) -> Result<Self, PolicyError> {
        Self::new(
            config.tenant_id.as_deref(),
            config.audience.as_deref(),
            &config.issuer_template,
        )
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// The exact `iss` value a token must carry.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}
