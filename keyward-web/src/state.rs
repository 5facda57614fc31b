//! Application state shared across request handlers

use crate::{store::SqliteIdentityStore, WebConfig, WebError, WebResult};
use keyward_core::{default_policies, IdentityStore, MemoryIdentityStore, PolicyRegistry, TokenIssuer};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Shared application state
///
/// The issuer and registry are stateless per call; the store is the only
/// component doing I/O.
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: WebConfig,
    /// Identity store backend
    pub store: Arc<dyn IdentityStore>,
    /// Token issuer
    pub tokens: Arc<TokenIssuer>,
    /// Named authorization policies, immutable after startup
    pub policies: Arc<PolicyRegistry>,
}

impl AppState {
    /// Create application state, choosing the store backend from config
    pub async fn new(config: WebConfig) -> WebResult<Self> {
        let store: Arc<dyn IdentityStore> = match &config.database_url {
            Some(url) => {
                let pool = connect(url).await?;
                let store = SqliteIdentityStore::new(pool)
                    .await
                    .map_err(|e| WebError::Database(e.to_string()))?;
                info!("using SQLite identity store: {}", url);
                Arc::new(store)
            }
            None => {
                info!("no database configured, using in-memory identity store");
                Arc::new(MemoryIdentityStore::new())
            }
        };

        Self::with_store(config, store)
    }

    /// Create application state over an existing store
    pub fn with_store(config: WebConfig, store: Arc<dyn IdentityStore>) -> WebResult<Self> {
        let tokens = Arc::new(TokenIssuer::new(&config.jwt)?);
        let policies = Arc::new(default_policies());

        Ok(Self {
            config,
            store,
            tokens,
            policies,
        })
    }
}

async fn connect(url: &str) -> WebResult<sqlx::SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| WebError::Database(e.to_string()))?
        .create_if_missing(true);

    // An in-memory database exists per connection; the pool must not open a
    // second one or reclaim the first.
    let pool_options = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    pool_options
        .connect_with(options)
        .await
        .map_err(|e| WebError::Database(e.to_string()))
}
