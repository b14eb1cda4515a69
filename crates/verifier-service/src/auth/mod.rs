//! Bearer token authentication.
//!
//! - `policy` - issuer/audience trust policy built from configuration
//! - `jwks` - per-tenant signing keys via OpenID discovery, cached with a TTL
//! - `jwt` - pure token validation producing a `ValidationOutcome`
//! - `claims` - verified claim set and display name

pub mod claims;
pub mod jwks;
pub mod jwt;
pub mod policy;

pub use claims::ClaimSet;
pub use jwks::{DiscoveryError, JwksClient, SigningKey, SigningKeyProvider, SigningKeySet};
pub use jwt::{JwtValidator, ValidationFailure, ValidationFailureKind, ValidationOutcome};
pub use policy::{PolicyError, TrustPolicy};
