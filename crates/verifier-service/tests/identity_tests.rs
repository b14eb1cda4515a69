//! Identity endpoint integration tests.
//!
//! Successful calls to `/api/SecureFunction`: response shape, display name
//! selection, claim rendering and supported key types.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use serde_json::{json, Value};
use verifier_test_utils::{MockIdentityProvider, TestSigningKey, TestTokenBuilder, TestVerifierServer};

const TENANT: &str = "contoso";
const AUDIENCE: &str = "api://verifier";

async fn spawn_with_keys(keys: &[&TestSigningKey]) -> Result<(MockIdentityProvider, TestVerifierServer)> {
    let idp = MockIdentityProvider::start().await;
    idp.publish_keys(TENANT, keys).await;
    let server = TestVerifierServer::spawn(idp.config_vars(TENANT, AUDIENCE)).await?;
    Ok((idp, server))
}

async fn call(server: &TestVerifierServer, token: &str) -> Result<reqwest::Response> {
    Ok(reqwest::Client::new()
        .get(server.secure_function_url())
        .bearer_auth(token)
        .send()
        .await?)
}

/// A valid token returns the display name and every claim as a string.
#[tokio::test]
async fn test_valid_token_returns_identity() -> Result<()> {
    let key = TestSigningKey::ed25519(1, "key-1");
    let (idp, server) = spawn_with_keys(&[&key]).await?;

    let claims = TestTokenBuilder::new(idp.issuer(TENANT), AUDIENCE)
        .for_subject("user-123")
        .with_name("Alice")
        .with_claim("roles", json!(["reader", "writer"]))
        .build();
    let response = call(&server, &key.sign(&claims)).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json; charset=utf-8"
    );

    let body: Value = response.json().await?;
    assert_eq!(body["Usuario"], "Alice");
    assert_eq!(body["Claims"]["sub"], "user-123");
    assert_eq!(body["Claims"]["iss"], idp.issuer(TENANT));
    assert_eq!(body["Claims"]["exp"], claims["exp"].to_string());
    assert_eq!(body["Claims"]["roles"], r#"["reader","writer"]"#);

    Ok(())
}

/// The body is indented JSON with `Usuario` before `Claims`.
#[tokio::test]
async fn test_response_is_pretty_printed() -> Result<()> {
    let key = TestSigningKey::ed25519(1, "key-1");
    let (idp, server) = spawn_with_keys(&[&key]).await?;

    let token = key.sign(&TestTokenBuilder::new(idp.issuer(TENANT), AUDIENCE).build());
    let text = call(&server, &token).await?.text().await?;

    assert!(text.starts_with("{\n  \"Usuario\""), "body: {text}");
    let usuario = text.find("\"Usuario\"").unwrap();
    let claims = text.find("\"Claims\"").unwrap();
    assert!(usuario < claims);

    Ok(())
}

/// Claims keep the order they have in the token.
#[tokio::test]
async fn test_claims_keep_token_order() -> Result<()> {
    let key = TestSigningKey::ed25519(1, "key-1");
    let (idp, server) = spawn_with_keys(&[&key]).await?;

    let token = key.sign(&TestTokenBuilder::new(idp.issuer(TENANT), AUDIENCE).build());
    let body: Value = call(&server, &token).await?.json().await?;

    let names: Vec<&str> = body["Claims"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(names, ["iss", "aud", "sub", "iat", "nbf", "exp"]);

    Ok(())
}

/// Without `name`, the display name falls back to `preferred_username`.
#[tokio::test]
async fn test_display_name_fallback() -> Result<()> {
    let key = TestSigningKey::ed25519(1, "key-1");
    let (idp, server) = spawn_with_keys(&[&key]).await?;

    let claims = TestTokenBuilder::new(idp.issuer(TENANT), AUDIENCE)
        .with_claim("preferred_username", json!("alice@contoso.example"))
        .build();
    let body: Value = call(&server, &key.sign(&claims)).await?.json().await?;

    assert_eq!(body["Usuario"], "alice@contoso.example");

    Ok(())
}

/// With no name-like claim at all, `Usuario` is null.
#[tokio::test]
async fn test_display_name_absent_is_null() -> Result<()> {
    let key = TestSigningKey::ed25519(1, "key-1");
    let (idp, server) = spawn_with_keys(&[&key]).await?;

    let claims = TestTokenBuilder::new(idp.issuer(TENANT), AUDIENCE)
        .without_claim("sub")
        .build();
    let body: Value = call(&server, &key.sign(&claims)).await?.json().await?;

    assert!(body["Usuario"].is_null());
    assert!(body["Claims"].get("sub").is_none());

    Ok(())
}

/// ES256 keys published as EC JWKs are accepted.
#[tokio::test]
async fn test_es256_token_is_accepted() -> Result<()> {
    let ec_key = TestSigningKey::es256("ec-key");
    let ed_key = TestSigningKey::ed25519(1, "ed-key");
    let (idp, server) = spawn_with_keys(&[&ed_key, &ec_key]).await?;

    let claims = TestTokenBuilder::new(idp.issuer(TENANT), AUDIENCE)
        .with_name("Bob")
        .build();
    let response = call(&server, &ec_key.sign(&claims)).await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["Usuario"], "Bob");

    Ok(())
}

/// RS256 keys published as RSA JWKs (`n`/`e`) are accepted.
#[tokio::test]
async fn test_rs256_token_is_accepted() -> Result<()> {
    let rsa_key = TestSigningKey::rs256("rsa-key");
    let ec_key = TestSigningKey::es256("ec-key");
    let (idp, server) = spawn_with_keys(&[&ec_key, &rsa_key]).await?;

    let claims = TestTokenBuilder::new(idp.issuer(TENANT), AUDIENCE)
        .with_name("Carol")
        .build();
    let response = call(&server, &rsa_key.sign(&claims)).await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["Usuario"], "Carol");

    Ok(())
}

/// An RS256 token presented under an EC key's id is rejected.
#[tokio::test]
async fn test_rs256_token_under_ec_kid_is_rejected() -> Result<()> {
    let ec_key = TestSigningKey::es256("shared-kid");
    let rsa_key = TestSigningKey::rs256("shared-kid");
    let (idp, server) = spawn_with_keys(&[&ec_key]).await?;

    let token = rsa_key.sign(&TestTokenBuilder::new(idp.issuer(TENANT), AUDIENCE).build());
    let response = call(&server, &token).await?;

    assert_eq!(response.status(), 401);

    Ok(())
}

/// An `aud` array is accepted when it contains the configured audience.
#[tokio::test]
async fn test_audience_array_is_accepted() -> Result<()> {
    let key = TestSigningKey::ed25519(1, "key-1");
    let (idp, server) = spawn_with_keys(&[&key]).await?;

    let claims = TestTokenBuilder::new(idp.issuer(TENANT), AUDIENCE)
        .with_audiences(&["api://other", AUDIENCE])
        .build();
    let response = call(&server, &key.sign(&claims)).await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["Claims"]["aud"], r#"["api://other","api://verifier"]"#);

    Ok(())
}

/// Unusable published keys are skipped without affecting the usable ones.
#[tokio::test]
async fn test_unusable_published_keys_are_skipped() -> Result<()> {
    let key = TestSigningKey::ed25519(1, "key-1");
    let idp = MockIdentityProvider::start().await;
    idp.publish_jwks_json(
        TENANT,
        json!({
            "keys": [
                { "kty": "oct", "k": "c2VjcmV0", "kid": "hmac" },
                { "kty": "OKP", "crv": "Ed25519", "x": "AAAA", "use": "enc", "kid": "enc-key" },
                key.jwk()
            ]
        }),
    )
    .await;
    let server = TestVerifierServer::spawn(idp.config_vars(TENANT, AUDIENCE)).await?;

    let token = key.sign(&TestTokenBuilder::new(idp.issuer(TENANT), AUDIENCE).build());
    assert_eq!(call(&server, &token).await?.status(), 200);

    Ok(())
}
