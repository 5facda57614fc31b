//! Keyward Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebConfig, WebError, WebResult};
use axum::serve;
use keyward_core::{seed_roles, JwtConfig};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main Keyward web server
pub struct KeywardServer {
    config: WebConfig,
    state: AppState,
}

impl KeywardServer {
    /// Create a new Keyward server
    pub async fn new(config: WebConfig) -> WebResult<Self> {
        let state = AppState::new(config.clone()).await?;

        Ok(Self { config, state })
    }

    /// Start the web server
    ///
    /// Baseline roles are seeded before the listener binds so the first
    /// request already sees them.
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();

        info!("🚀 Starting Keyward Web Server");
        info!("📍 Server address: http://{}", address);

        seed_roles(self.state.store.as_ref()).await?;

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("✅ Server listening on http://{}", address);

        if let Err(e) = serve(listener, app).await {
            error!("❌ Server error: {}", e);
            return Err(WebError::Server(e));
        }

        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Builder for KeywardServer
pub struct KeywardServerBuilder {
    config: WebConfig,
}

impl KeywardServerBuilder {
    /// Create a new server builder; signing configuration has no default
    pub fn new(jwt: JwtConfig) -> Self {
        Self {
            config: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                database_url: None,
                jwt,
            },
        }
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set database URL
    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.database_url = Some(database_url.into());
        self
    }

    /// Build the server
    pub async fn build(self) -> WebResult<KeywardServer> {
        KeywardServer::new(self.config).await
    }
}
