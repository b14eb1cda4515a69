//! Liveness handler.

/// Liveness handler.
///
/// Returns a simple "OK" response to indicate the process is running.
/// Does NOT contact the identity provider; signing key availability is
/// reported per request by the verifier endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        assert_eq!(health_check().await, "OK");
    }
}
