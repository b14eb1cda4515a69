//! Bearer token verifier service library.
//!
//! A stateless HTTP endpoint that validates OAuth2/OIDC bearer tokens
//! (compact JWTs) against an identity provider's published signing keys
//! and an issuer/audience trust policy, then returns the caller's claims.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/{jwks,jwt}.rs -> handlers/*.rs
//! ```
//!
//! The signing key provider (`auth::jwks`) is the leaf: it fetches and caches
//! per-tenant keys. The validator (`auth::jwt`) only sees a key set and is
//! pure.
//!
//! # Modules
//!
//! - `auth` - Trust policy, signing keys, token validation, claims
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `observability` - Metric definitions
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
