//! Verifier endpoint handler.
//!
//! Returns the authenticated caller's display name and claims.

use crate::auth::ClaimSet;
use crate::errors::VerifierError;
use axum::{
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::instrument;

/// Response for `/api/SecureFunction`.
///
/// Field names are part of the public contract.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityResponse {
    /// Caller display name, `null` when the token carries none.
    #[serde(rename = "Usuario")]
    pub usuario: Option<String>,

    /// Every claim, rendered as a string, in token order.
    #[serde(rename = "Claims")]
    pub claims: Map<String, Value>,
}

impl From<&ClaimSet> for IdentityResponse {
    fn from(claims: &ClaimSet) -> Self {
        Self {
            usuario: claims.display_name().map(str::to_string),
            claims: claims.to_json_object(),
        }
    }
}

/// Handler for GET /api/SecureFunction
///
/// Requires valid authentication via the auth middleware.
///
/// ## Response
///
/// Returns 200 OK with pretty-printed JSON:
///
/// ```json
/// {
///   "Usuario": "Alice",
///   "Claims": {
///     "aud": "api://verifier",
///     "exp": "1700003600",
///     "name": "Alice"
///   }
/// }
/// ```
#[instrument(skip_all, name = "verifier.handlers.identity")]
pub async fn get_identity(
    Extension(claims): Extension<ClaimSet>,
) -> Result<Response, VerifierError> {
    tracing::debug!(target: "verifier.handlers.identity", "Returning caller claims");

    let body = serde_json::to_string_pretty(&IdentityResponse::from(&claims)).map_err(|e| {
        tracing::error!(target: "verifier.handlers.identity", error = %e, "Failed to serialize claims");
        VerifierError::Internal
    })?;

    Ok((
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        body,
    )
        .into_response())
}
