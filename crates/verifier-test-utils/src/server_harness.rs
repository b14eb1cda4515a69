//! Test server harness for E2E testing
//!
//! Provides `TestVerifierServer` for spawning real verifier instances in tests.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use verifier_service::auth::SigningKeyProvider;
use verifier_service::config::Config;
use verifier_service::routes::{self, AppState};

/// Test harness for spawning the verifier in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<()> {
///     let server = TestVerifierServer::spawn(HashMap::new()).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestVerifierServer {
    addr: SocketAddr,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestVerifierServer {
    /// Spawn a verifier backed by the discovery-based key provider.
    ///
    /// The server binds to a random available port (127.0.0.1:0) regardless of
    /// `BIND_ADDRESS`, and serves in the background until dropped.
    pub async fn spawn(vars: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;
        let state = AppState::new(config.clone());
        Self::serve(config, state).await
    }

    /// Spawn a verifier with an explicit signing key provider.
    pub async fn spawn_with_provider(
        vars: HashMap<String, String>,
        key_provider: Arc<dyn SigningKeyProvider>,
    ) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;
        let state = AppState::with_key_provider(config.clone(), key_provider);
        Self::serve(config, state).await
    }

    async fn serve(config: Config, state: AppState) -> Result<Self, anyhow::Error> {
        // Handle without a global recorder; /metrics renders an empty page
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = routes::build_routes(Arc::new(state), metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of the identity endpoint.
    pub fn secure_function_url(&self) -> String {
        format!("{}/api/SecureFunction", self.url())
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestVerifierServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so each test cleans up immediately
        self._handle.abort();
    }
}
