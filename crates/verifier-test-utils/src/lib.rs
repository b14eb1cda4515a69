//! # Verifier Test Utilities
//!
//! Shared test utilities for the bearer token verifier.
//!
//! This crate provides:
//! - Signing key fixtures (`TestSigningKey`, Ed25519 and ES256)
//! - Token claim builders (`TestTokenBuilder`)
//! - A wiremock-backed identity provider (`MockIdentityProvider`)
//! - Server test harness (`TestVerifierServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use verifier_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let idp = MockIdentityProvider::start().await;
//!     let key = TestSigningKey::ed25519(1, "key-1");
//!     idp.publish_keys("tenant-a", &[&key]).await;
//!
//!     let server = TestVerifierServer::spawn(idp.config_vars("tenant-a", "api://app")).await?;
//!     let token = key.sign(&TestTokenBuilder::new(idp.issuer("tenant-a"), "api://app").build());
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/SecureFunction", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_idp;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_idp::*;
pub use server_harness::*;
pub use token_builders::*;
