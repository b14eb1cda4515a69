//! Mock identity provider for E2E testing
//!
//! Serves per-tenant OpenID discovery documents and JWKS from a wiremock
//! server, so tests can exercise the real discovery path end to end.

use crate::crypto_fixtures::{jwks_json, TestSigningKey};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Wiremock-backed identity provider.
///
/// # Example
/// ```rust,ignore
/// let idp = MockIdentityProvider::start().await;
/// let key = TestSigningKey::ed25519(1, "key-1");
/// idp.publish_keys("tenant-a", &[&key]).await;
/// ```
pub struct MockIdentityProvider {
    server: MockServer,
}

impl MockIdentityProvider {
    /// Start a mock identity provider on a random port.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Authority URL to configure as `IDP_AUTHORITY_URL`.
    pub fn authority_url(&self) -> String {
        self.server.uri()
    }

    /// Issuer tokens for `tenant_id` must carry.
    pub fn issuer(&self, tenant_id: &str) -> String {
        format!("{}/{}/v2.0", self.server.uri(), tenant_id)
    }

    /// Path of the tenant's discovery document.
    pub fn discovery_path(tenant_id: &str) -> String {
        format!("/{}/v2.0/.well-known/openid-configuration", tenant_id)
    }

    /// Path of the tenant's JWKS document.
    pub fn jwks_path(tenant_id: &str) -> String {
        format!("/{}/discovery/v2.0/keys", tenant_id)
    }

    /// Environment for a verifier trusting `tenant_id` and `audience` at this provider.
    pub fn config_vars(&self, tenant_id: &str, audience: &str) -> HashMap<String, String> {
        HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("IDP_AUTHORITY_URL".to_string(), self.authority_url()),
            ("AZUREAD_TENANT_ID".to_string(), tenant_id.to_string()),
            ("AZUREAD_AUDIENCE".to_string(), audience.to_string()),
        ])
    }

    fn discovery_document(&self, tenant_id: &str) -> Value {
        json!({
            "issuer": self.issuer(tenant_id),
            "jwks_uri": format!("{}{}", self.server.uri(), Self::jwks_path(tenant_id)),
            "id_token_signing_alg_values_supported": ["RS256", "ES256", "EdDSA"]
        })
    }

    /// Publish a discovery document and a JWKS holding `keys` for `tenant_id`.
    pub async fn publish_keys(&self, tenant_id: &str, keys: &[&TestSigningKey]) {
        self.publish_jwks_json(tenant_id, jwks_json(keys)).await;
    }

    /// Publish a discovery document and an arbitrary JWKS body for `tenant_id`.
    pub async fn publish_jwks_json(&self, tenant_id: &str, jwks: Value) {
        Mock::given(method("GET"))
            .and(path(Self::discovery_path(tenant_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.discovery_document(tenant_id)))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path(Self::jwks_path(tenant_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .mount(&self.server)
            .await;
    }

    /// Replace every published document with a fresh key set for `tenant_id`.
    ///
    /// Received request history is cleared as well.
    pub async fn rotate_keys(&self, tenant_id: &str, keys: &[&TestSigningKey]) {
        self.server.reset().await;
        self.publish_keys(tenant_id, keys).await;
    }

    /// Serve the discovery document only after `delay`.
    pub async fn publish_slow_discovery(&self, tenant_id: &str, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(Self::discovery_path(tenant_id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(self.discovery_document(tenant_id))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer discovery for `tenant_id` with `status`.
    pub async fn fail_discovery(&self, tenant_id: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(Self::discovery_path(tenant_id)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Publish a discovery document with no `jwks_uri`.
    pub async fn publish_discovery_without_jwks_uri(&self, tenant_id: &str) {
        Mock::given(method("GET"))
            .and(path(Self::discovery_path(tenant_id)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "issuer": self.issuer(tenant_id) })),
            )
            .mount(&self.server)
            .await;
    }

    /// Number of discovery requests received for `tenant_id`.
    pub async fn discovery_request_count(&self, tenant_id: &str) -> usize {
        let discovery_path = Self::discovery_path(tenant_id);
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == discovery_path)
            .count()
    }

    /// Total number of requests received.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publishes_discovery_and_jwks() {
        let idp = MockIdentityProvider::start().await;
        let key = TestSigningKey::ed25519(1, "key-1");
        idp.publish_keys("tenant-a", &[&key]).await;

        let discovery_url = format!(
            "{}{}",
            idp.authority_url(),
            MockIdentityProvider::discovery_path("tenant-a")
        );
        let discovery: Value = reqwest::get(&discovery_url)
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(discovery["issuer"], idp.issuer("tenant-a"));

        let jwks: Value = reqwest::get(discovery["jwks_uri"].as_str().unwrap())
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(jwks["keys"][0]["kid"], "key-1");

        assert_eq!(idp.discovery_request_count("tenant-a").await, 1);
        assert_eq!(idp.request_count().await, 2);
    }

    #[tokio::test]
    async fn test_config_vars_point_at_mock() {
        let idp = MockIdentityProvider::start().await;
        let vars = idp.config_vars("tenant-a", "api://app");

        assert_eq!(vars["IDP_AUTHORITY_URL"], idp.authority_url());
        assert_eq!(vars["AZUREAD_TENANT_ID"], "tenant-a");
        assert_eq!(vars["AZUREAD_AUDIENCE"], "api://app");
    }
}
