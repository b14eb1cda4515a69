//! Signing key provider: OpenID discovery plus a per-tenant JWKS cache.
//!
//! For a tenant the provider fetches
//! `<authority>/<tenant>/v2.0/.well-known/openid-configuration`, follows its
//! `jwks_uri` and parses the published keys into a [`SigningKeySet`].
//!
//! # Security
//!
//! - Key sets are cached per tenant and only ever looked up by their own
//!   tenant id
//! - Cache entries expire after a configurable TTL to pick up key rotations
//! - The whole two-hop fetch is bounded by the discovery timeout
//! - Symmetric keys are never admitted into a key set

use crate::config::Config;
use crate::observability::metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::jwk::{
    AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm, PublicKeyUse,
};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

/// Failures while obtaining a tenant's signing keys.
///
/// Every variant means the identity provider is unavailable (HTTP 503). The
/// detail is for server-side logs only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed discovery document: {0}")]
    MalformedDiscovery(String),

    #[error("discovery document has no jwks_uri")]
    MissingJwksUri,

    #[error("malformed JWKS: {0}")]
    MalformedJwks(String),

    #[error("discovery timed out after {0:?}")]
    Timeout(Duration),
}

/// Why a published JWK was left out of a key set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyRejection {
    #[error("key has no kid")]
    MissingKid,

    #[error("key use is not sig")]
    NotForSigning,

    #[error("symmetric keys are not accepted")]
    Symmetric,

    #[error("unusable key material: {0}")]
    Unusable(String),
}

/// One public signing key published by the identity provider.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    jwk: Jwk,
    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("key_type", &key_type_name(&self.jwk))
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Build a signing key from a parsed JWK.
    pub fn from_jwk(jwk: Jwk) -> Result<Self, KeyRejection> {
        let kid = jwk
            .common
            .key_id
            .clone()
            .filter(|kid| !kid.is_empty())
            .ok_or(KeyRejection::MissingKid)?;

        if matches!(
            &jwk.common.public_key_use,
            Some(key_use) if !matches!(key_use, PublicKeyUse::Signature)
        ) {
            return Err(KeyRejection::NotForSigning);
        }

        if matches!(jwk.algorithm, AlgorithmParameters::OctetKey(_)) {
            return Err(KeyRejection::Symmetric);
        }

        let decoding_key =
            DecodingKey::from_jwk(&jwk).map_err(|e| KeyRejection::Unusable(e.to_string()))?;

        Ok(Self {
            kid,
            jwk,
            decoding_key,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Whether this key may verify a token signed with `alg`.
    ///
    /// The key type and curve must belong to the algorithm's family, and a
    /// JWK `alg`, when published, must name the same algorithm.
    pub fn supports(&self, alg: Algorithm) -> bool {
        if let Some(key_alg) = self.jwk.common.key_algorithm {
            if !key_algorithm_matches(key_alg, alg) {
                return false;
            }
        }

        match &self.jwk.algorithm {
            AlgorithmParameters::RSA(_) => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            AlgorithmParameters::EllipticCurve(params) => matches!(
                (&params.curve, alg),
                (EllipticCurve::P256, Algorithm::ES256) | (EllipticCurve::P384, Algorithm::ES384)
            ),
            AlgorithmParameters::OctetKeyPair(params) => {
                params.curve == EllipticCurve::Ed25519 && alg == Algorithm::EdDSA
            }
            AlgorithmParameters::OctetKey(_) => false,
        }
    }
}

fn key_algorithm_matches(key_alg: KeyAlgorithm, alg: Algorithm) -> bool {
    matches!(
        (key_alg, alg),
        (KeyAlgorithm::RS256, Algorithm::RS256)
            | (KeyAlgorithm::RS384, Algorithm::RS384)
            | (KeyAlgorithm::RS512, Algorithm::RS512)
            | (KeyAlgorithm::PS256, Algorithm::PS256)
            | (KeyAlgorithm::PS384, Algorithm::PS384)
            | (KeyAlgorithm::PS512, Algorithm::PS512)
            | (KeyAlgorithm::ES256, Algorithm::ES256)
            | (KeyAlgorithm::ES384, Algorithm::ES384)
            | (KeyAlgorithm::EdDSA, Algorithm::EdDSA)
    )
}

fn key_type_name(jwk: &Jwk) -> &'static str {
    match jwk.algorithm {
        AlgorithmParameters::RSA(_) => "RSA",
        AlgorithmParameters::EllipticCurve(_) => "EC",
        AlgorithmParameters::OctetKeyPair(_) => "OKP",
        AlgorithmParameters::OctetKey(_) => "oct",
    }
}

/// A tenant's published signing keys at one point in time.
///
/// Immutable once built; shared with validators behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SigningKeySet {
    tenant_id: String,
    keys: Vec<SigningKey>,
    fetched_at: DateTime<Utc>,
    metadata_url: String,
}

/// JWKS document as published at `jwks_uri`.
///
/// Keys stay raw JSON so one bad key does not fail the whole set.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<serde_json::Value>,
}

impl SigningKeySet {
    /// Create a key set fetched now.
    pub fn new(
        tenant_id: impl Into<String>,
        metadata_url: impl Into<String>,
        keys: Vec<SigningKey>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            keys,
            fetched_at: Utc::now(),
            metadata_url: metadata_url.into(),
        }
    }

    /// Parse a JWKS body, skipping keys that are unusable for verification.
    pub fn from_jwks_json(
        tenant_id: impl Into<String>,
        metadata_url: impl Into<String>,
        body: &[u8],
    ) -> Result<Self, DiscoveryError> {
        let tenant_id = tenant_id.into();
        let document: JwksDocument = serde_json::from_slice(body)
            .map_err(|e| DiscoveryError::MalformedJwks(e.to_string()))?;

        let published = document.keys.len();
        let mut keys = Vec::with_capacity(published);

        for (index, value) in document.keys.into_iter().enumerate() {
            let parsed = serde_json::from_value::<Jwk>(value)
                .map_err(|e| KeyRejection::Unusable(e.to_string()))
                .and_then(SigningKey::from_jwk);

            match parsed {
                Ok(key) => keys.push(key),
                Err(reason) => {
                    tracing::warn!(
                        target: "verifier.auth.jwks",
                        tenant_id = %tenant_id,
                        index,
                        reason = %reason,
                        "Skipping published key"
                    );
                }
            }
        }

        if keys.is_empty() && published > 0 {
            tracing::warn!(
                target: "verifier.auth.jwks",
                tenant_id = %tenant_id,
                published,
                "No usable signing keys in JWKS"
            );
        }

        Ok(Self::new(tenant_id, metadata_url, keys))
    }

    /// Override the fetch timestamp (for key-set age tests).
    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    /// The single key published under `kid`.
    ///
    /// Returns `None` when no key, or more than one key, carries the id.
    pub fn resolve(&self, kid: &str) -> Option<&SigningKey> {
        let mut matches = self.keys.iter().filter(|key| key.kid == kid);
        match (matches.next(), matches.next()) {
            (Some(key), None) => Some(key),
            _ => None,
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn keys(&self) -> &[SigningKey] {
        &self.keys
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn metadata_url(&self) -> &str {
        &self.metadata_url
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Source of per-tenant signing keys.
#[async_trait]
pub trait SigningKeyProvider: Send + Sync {
    /// The tenant's current key set, served from cache while fresh.
    async fn signing_keys(&self, tenant_id: &str) -> Result<Arc<SigningKeySet>, DiscoveryError>;

    /// Fetch the tenant's key set regardless of cache state.
    async fn refresh_signing_keys(
        &self,
        tenant_id: &str,
    ) -> Result<Arc<SigningKeySet>, DiscoveryError>;
}

/// OpenID discovery document fields this service reads.
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    jwks_uri: Option<String>,
}

/// Cached key set with expiry time.
struct CachedKeySet {
    keys: Arc<SigningKeySet>,
    expires_at: Instant,
}

/// Discovery-backed signing key provider with a per-tenant TTL cache.
pub struct JwksClient {
    /// Identity provider authority, without trailing slash.
    authority_url: String,

    /// HTTP client for discovery and JWKS fetches.
    http_client: reqwest::Client,

    /// Cached key sets keyed by tenant id.
    cache: Arc<RwLock<HashMap<String, CachedKeySet>>>,

    /// Cache TTL duration.
    cache_ttl: Duration,

    /// Bound on one discovery + JWKS fetch.
    discovery_timeout: Duration,
}

impl JwksClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `authority_url` - Identity provider authority (e.g. `https://login.microsoftonline.com`)
    /// * `cache_ttl` - How long to serve a tenant's keys before refetching
    /// * `discovery_timeout` - Bound on the discovery + JWKS fetch, also applied per request
    pub fn new(authority_url: String, cache_ttl: Duration, discovery_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(discovery_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "verifier.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            authority_url: authority_url.trim_end_matches('/').to_string(),
            http_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
            discovery_timeout,
        }
    }

    /// Create a client from service configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.authority_url.clone(),
            config.jwks_cache_ttl(),
            config.discovery_timeout(),
        )
    }

    /// Discovery document URL for a tenant.
    pub fn metadata_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/{}/v2.0/.well-known/openid-configuration",
            self.authority_url, tenant_id
        )
    }

    /// Fetch, then swap the new entry in under a short write lock.
    async fn fetch_and_store(&self, tenant_id: &str) -> Result<Arc<SigningKeySet>, DiscoveryError> {
        let metadata_url = self.metadata_url(tenant_id);
        let start = Instant::now();

        let result = match tokio::time::timeout(
            self.discovery_timeout,
            self.fetch_key_set(tenant_id, &metadata_url),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DiscoveryError::Timeout(self.discovery_timeout)),
        };

        let key_set = match result {
            Ok(key_set) => {
                metrics::record_jwks_fetch("success", start.elapsed());
                Arc::new(key_set)
            }
            Err(e) => {
                let status = if matches!(e, DiscoveryError::Timeout(_)) {
                    "timeout"
                } else {
                    "error"
                };
                metrics::record_jwks_fetch(status, start.elapsed());
                tracing::error!(
                    target: "verifier.auth.jwks",
                    tenant_id = %tenant_id,
                    error = %e,
                    "Failed to fetch signing keys"
                );
                return Err(e);
            }
        };

        tracing::info!(
            target: "verifier.auth.jwks",
            tenant_id = %tenant_id,
            key_count = key_set.len(),
            "Signing key cache refreshed"
        );

        let mut cache = self.cache.write().await;
        cache.insert(
            tenant_id.to_string(),
            CachedKeySet {
                keys: Arc::clone(&key_set),
                expires_at: Instant::now() + self.cache_ttl,
            },
        );

        Ok(key_set)
    }

    /// Discovery document, then JWKS.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn fetch_key_set(
        &self,
        tenant_id: &str,
        metadata_url: &str,
    ) -> Result<SigningKeySet, DiscoveryError> {
        tracing::debug!(target: "verifier.auth.jwks", url = %metadata_url, "Fetching discovery document");

        let discovery_body = self.get_bytes(metadata_url).await?;
        let discovery: DiscoveryDocument = serde_json::from_slice(&discovery_body)
            .map_err(|e| DiscoveryError::MalformedDiscovery(e.to_string()))?;

        let jwks_uri = discovery
            .jwks_uri
            .filter(|uri| !uri.trim().is_empty())
            .ok_or(DiscoveryError::MissingJwksUri)?;

        tracing::debug!(target: "verifier.auth.jwks", url = %jwks_uri, "Fetching JWKS");

        let jwks_body = self.get_bytes(&jwks_uri).await?;
        SigningKeySet::from_jwks_json(tenant_id, metadata_url, &jwks_body)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DiscoveryError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| DiscoveryError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| DiscoveryError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(body.to_vec())
    }

    /// Clear the cache.
    ///
    /// Useful for testing.
    #[cfg(test)]
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }
}

#[async_trait]
impl SigningKeyProvider for JwksClient {
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn signing_keys(&self, tenant_id: &str) -> Result<Arc<SigningKeySet>, DiscoveryError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(tenant_id) {
                if cached.expires_at > Instant::now() {
                    tracing::debug!(target: "verifier.auth.jwks", tenant_id = %tenant_id, "Signing key cache hit");
                    metrics::record_jwks_cache_lookup("hit");
                    return Ok(Arc::clone(&cached.keys));
                }
            }
        }

        metrics::record_jwks_cache_lookup("miss");
        self.fetch_and_store(tenant_id).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn refresh_signing_keys(
        &self,
        tenant_id: &str,
    ) -> Result<Arc<SigningKeySet>, DiscoveryError> {
        metrics::record_jwks_cache_lookup("refresh");
        self.fetch_and_store(tenant_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const ED25519_X: &str = "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo";

    fn okp_jwk(kid: &str) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": ED25519_X,
            "kid": kid,
            "use": "sig"
        })
    }

    fn key_set(body: serde_json::Value) -> SigningKeySet {
        SigningKeySet::from_jwks_json(
            "tenant-a",
            "https://idp.example.com/tenant-a/v2.0/.well-known/openid-configuration",
            body.to_string().as_bytes(),
        )
        .expect("JWKS should parse")
    }

    #[test]
    fn test_parses_okp_key() {
        let set = key_set(serde_json::json!({ "keys": [okp_jwk("k1")] }));

        assert_eq!(set.len(), 1);
        assert_eq!(set.tenant_id(), "tenant-a");
        let key = set.resolve("k1").expect("key should resolve");
        assert_eq!(key.kid(), "k1");
        assert!(key.supports(Algorithm::EdDSA));
        assert!(!key.supports(Algorithm::ES256));
        assert!(!key.supports(Algorithm::RS256));
        assert!(!key.supports(Algorithm::HS256));
    }

    #[test]
    fn test_skips_unusable_keys() {
        let set = key_set(serde_json::json!({
            "keys": [
                okp_jwk("good"),
                { "kty": "OKP", "crv": "Ed25519", "x": ED25519_X, "use": "sig" },
                { "kty": "OKP", "crv": "Ed25519", "x": ED25519_X, "kid": "enc", "use": "enc" },
                { "kty": "oct", "k": "c2VjcmV0", "kid": "hmac" },
                { "kty": "unknown", "kid": "weird" },
                "not even an object"
            ]
        }));

        assert_eq!(set.len(), 1);
        assert!(set.resolve("good").is_some());
        assert!(set.resolve("enc").is_none());
        assert!(set.resolve("hmac").is_none());
        assert!(set.resolve("weird").is_none());
    }

    #[test]
    fn test_key_without_use_is_accepted() {
        let set = key_set(serde_json::json!({
            "keys": [{ "kty": "OKP", "crv": "Ed25519", "x": ED25519_X, "kid": "nouse" }]
        }));

        assert!(set.resolve("nouse").is_some());
    }

    #[test]
    fn test_duplicate_kid_does_not_resolve() {
        let set = key_set(serde_json::json!({ "keys": [okp_jwk("dup"), okp_jwk("dup")] }));

        assert_eq!(set.len(), 2);
        assert!(set.resolve("dup").is_none());
    }

    #[test]
    fn test_empty_key_list_is_valid() {
        let set = key_set(serde_json::json!({ "keys": [] }));
        assert!(set.is_empty());
        assert!(set.resolve("any").is_none());
    }

    #[test]
    fn test_missing_keys_field_is_malformed() {
        let result = SigningKeySet::from_jwks_json("t", "u", br#"{"not_keys": []}"#);
        assert!(matches!(result, Err(DiscoveryError::MalformedJwks(_))));

        let result = SigningKeySet::from_jwks_json("t", "u", b"<html>");
        assert!(matches!(result, Err(DiscoveryError::MalformedJwks(_))));
    }

    #[test]
    fn test_jwk_alg_must_match_header_alg() {
        let set = key_set(serde_json::json!({
            "keys": [{
                "kty": "OKP", "crv": "Ed25519", "x": ED25519_X,
                "kid": "pinned", "alg": "EdDSA"
            }]
        }));

        let key = set.resolve("pinned").unwrap();
        assert!(key.supports(Algorithm::EdDSA));
        assert!(!key.supports(Algorithm::RS256));
    }

    #[test]
    fn test_debug_does_not_print_key_material() {
        let set = key_set(serde_json::json!({ "keys": [okp_jwk("k1")] }));
        let rendered = format!("{:?}", set.resolve("k1").unwrap());

        assert!(rendered.contains("k1"));
        assert!(rendered.contains("OKP"));
        assert!(!rendered.contains(ED25519_X));
    }

    #[test]
    fn test_metadata_url_layout() {
        let client = JwksClient::new(
            "https://login.microsoftonline.com/".to_string(),
            Duration::from_secs(300),
            Duration::from_secs(10),
        );

        assert_eq!(
            client.metadata_url("contoso"),
            "https://login.microsoftonline.com/contoso/v2.0/.well-known/openid-configuration"
        );
    }

    #[tokio::test]
    async fn test_unreachable_authority_is_discovery_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let client = JwksClient::new(
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(300),
            Duration::from_secs(2),
        );

        let result = client.signing_keys("tenant-a").await;
        assert!(matches!(
            result,
            Err(DiscoveryError::Request { .. }) | Err(DiscoveryError::Timeout(_))
        ));

        client.clear_cache().await;
    }
}
