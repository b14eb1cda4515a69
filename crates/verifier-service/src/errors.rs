//! Verifier service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Each
//! variant carries the operator-configured client text, so bodies never
//! contain token bytes, key material or internal error text. Causes are
//! logged server-side where the error is raised.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// `WWW-Authenticate` challenge for requests without usable credentials.
const CHALLENGE_MISSING_CREDENTIALS: &str = "Bearer";

/// `WWW-Authenticate` challenge for rejected tokens.
const CHALLENGE_INVALID_TOKEN: &str = "Bearer error=\"invalid_token\"";

/// Verifier service error type.
///
/// Maps to HTTP status codes:
/// - MissingCredentials, InvalidToken: 401 Unauthorized
/// - Configuration, Internal: 500 Internal Server Error
/// - SigningKeysUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Configuration fault: {0}")]
    Configuration(String),

    #[error("Signing keys unavailable: {0}")]
    SigningKeysUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl VerifierError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            VerifierError::MissingCredentials(_) | VerifierError::InvalidToken(_) => 401,
            VerifierError::Configuration(_) | VerifierError::Internal => 500,
            VerifierError::SigningKeysUnavailable(_) => 503,
        }
    }
}

impl IntoResponse for VerifierError {
    fn into_response(self) -> Response {
        let (status, challenge, body) = match self {
            VerifierError::MissingCredentials(message) => (
                StatusCode::UNAUTHORIZED,
                Some(CHALLENGE_MISSING_CREDENTIALS),
                message,
            ),
            VerifierError::InvalidToken(message) => (
                StatusCode::UNAUTHORIZED,
                Some(CHALLENGE_INVALID_TOKEN),
                message,
            ),
            VerifierError::Configuration(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, None, message)
            }
            VerifierError::SigningKeysUnavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, None, message)
            }
            VerifierError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                None,
                "An internal error occurred".to_string(),
            ),
        };

        // String bodies are served as text/plain; charset=utf-8
        let mut response = (status, body).into_response();

        if let Some(challenge) = challenge {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(challenge),
            );
        }

        response
    }
}
