//! Signing key fixtures for testing
//!
//! Provides Ed25519 keypairs (deterministic, seed-based), ES256 keypairs
//! (randomly generated) and a fixed RS256 keypair, together with their public
//! JWK representation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, Ed25519KeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING,
};
use serde_json::{json, Value};

/// Fixed 2048-bit RSA test key (PKCS#1 PEM). Never use outside tests.
const RSA_TEST_KEY_PEM: &str = include_str!("../fixtures/rsa_test_key.pem");

/// Base64url modulus of [`RSA_TEST_KEY_PEM`].
const RSA_TEST_KEY_N: &str = "vpqRKwJKEdUpTsAMBv56mH4F3r34h6DenfoIWsXtPpZ_uqRioc947DylKSrUP62b3nHTs7wPGEhUcDRD5BI1L5xi62zAnJR7aYE-12Ejq6dWHdeHvlHOjHfIC3DupuSQJCqIOoGS0CDLWekqer4FSfnyCxOOZrHyxU_waGQuDIaRhn_CmKtk7aIivosMOzAbGuIiOA1ew56TC1duvCpIFU4BQoRtRun-RK5oERR-1nzm0jdNo7neYvAEA4hdDnk6A4GiUR5udmQbX72-ojYMZcLf4gXGA9EpX3rB154dHE-1ev8FFrYlKESplpBlpcxGvoIOzxtgkQqyYDsnHF-vDQ";

/// Base64url public exponent (65537) of [`RSA_TEST_KEY_PEM`].
const RSA_TEST_KEY_E: &str = "AQAB";

/// A private signing key plus the JWK an identity provider would publish.
pub struct TestSigningKey {
    kid: String,
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    jwk: Value,
}

impl TestSigningKey {
    /// Deterministic Ed25519 key: the same seed always produces the same key.
    ///
    /// # Arguments
    /// * `seed` - Seed value for deterministic key generation (0-255)
    /// * `kid` - Key id published in the JWK and set in token headers
    pub fn ed25519(seed: u8, kid: &str) -> Self {
        // Create deterministic 32-byte seed from input
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("Failed to create test Ed25519 keypair");
        let public_x = URL_SAFE_NO_PAD.encode(key_pair.public_key().as_ref());

        Self {
            kid: kid.to_string(),
            algorithm: Algorithm::EdDSA,
            encoding_key: EncodingKey::from_ed_der(&build_pkcs8_from_seed(&seed_bytes)),
            jwk: json!({
                "kty": "OKP",
                "crv": "Ed25519",
                "x": public_x,
                "kid": kid,
                "use": "sig",
                "alg": "EdDSA"
            }),
        }
    }

    /// Random P-256 key for ES256 tokens.
    pub fn es256(kid: &str) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .expect("Failed to generate test P-256 keypair");
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .expect("Failed to parse test P-256 keypair");

        // Uncompressed point: 0x04 || x (32 bytes) || y (32 bytes)
        let point = key_pair.public_key().as_ref();
        assert_eq!(point.len(), 65, "P-256 public key must be uncompressed");
        let x = URL_SAFE_NO_PAD.encode(&point[1..33]);
        let y = URL_SAFE_NO_PAD.encode(&point[33..65]);

        Self {
            kid: kid.to_string(),
            algorithm: Algorithm::ES256,
            encoding_key: EncodingKey::from_ec_der(pkcs8.as_ref()),
            jwk: json!({
                "kty": "EC",
                "crv": "P-256",
                "x": x,
                "y": y,
                "kid": kid,
                "use": "sig",
                "alg": "ES256"
            }),
        }
    }

    /// RS256 key from a fixed PEM, published as an RSA JWK (`n`/`e`).
    ///
    /// Every call returns the same key material; only `kid` varies.
    pub fn rs256(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            algorithm: Algorithm::RS256,
            encoding_key: EncodingKey::from_rsa_pem(RSA_TEST_KEY_PEM.as_bytes())
                .expect("Failed to parse test RSA key"),
            jwk: json!({
                "kty": "RSA",
                "n": RSA_TEST_KEY_N,
                "e": RSA_TEST_KEY_E,
                "kid": kid,
                "use": "sig",
                "alg": "RS256"
            }),
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Public JWK as published in a JWKS document.
    pub fn jwk(&self) -> Value {
        self.jwk.clone()
    }

    /// Sign claims with this key's algorithm and `kid`.
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(self.algorithm);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());
        self.sign_with_header(&header, claims)
    }

    /// Sign claims with an explicit header (e.g. a missing or foreign `kid`).
    pub fn sign_with_header(&self, header: &Header, claims: &Value) -> String {
        encode(header, claims, &self.encoding_key).expect("Failed to sign test token")
    }
}

/// JWKS document containing the public JWKs of `keys`.
pub fn jwks_json(keys: &[&TestSigningKey]) -> Value {
    json!({ "keys": keys.iter().map(|key| key.jwk()).collect::<Vec<_>>() })
}

/// Build PKCS#8 v1 document from Ed25519 seed
///
/// This is a test-only utility. Production code must use ring::rand::SystemRandom.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    // PKCS#8 v1 format for Ed25519 (RFC 5208):
    // SEQUENCE {
    //   version         INTEGER (0),
    //   algorithm       AlgorithmIdentifier,
    //   privateKey      OCTET STRING
    // }
    // Where privateKey for Ed25519 is:
    // OCTET STRING containing OCTET STRING with 32-byte seed

    let mut pkcs8 = Vec::new();

    // Outer SEQUENCE tag, length 46
    pkcs8.extend_from_slice(&[0x30, 0x2e]);

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // AlgorithmIdentifier: SEQUENCE { OID 1.3.101.112 }
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);

    // Private key: OCTET STRING (34) containing OCTET STRING (32) with seed
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);

    pkcs8
}
