//! Keyward Web Server
//!
//! HTTP frontend for the Keyward identity service: login, registration, user
//! CRUD, role assignment, and claim management over the core identity store.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod store;

// Re-export main types
pub use server::KeywardServer;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use keyward_core::JwtConfig;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_origin("http://127.0.0.1:3000".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_credentials(true)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    Router::new()
        .nest("/auth", routes::auth_routes())
        .nest("/users", routes::user_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL; the in-memory store is used when unset
    pub database_url: Option<String>,
    /// Token signing configuration
    pub jwt: JwtConfig,
}

impl WebConfig {
    /// Load configuration from environment variables
    ///
    /// Fails when the JWT signing secret is absent; the process must not
    /// start without it.
    pub fn from_env() -> Result<Self, keyward_core::ConfigError> {
        Ok(Self {
            host: std::env::var("KEYWARD_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("KEYWARD_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            database_url: std::env::var("DATABASE_URL").ok(),
            jwt: JwtConfig::from_env()?,
        })
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] keyward_core::ConfigError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Seeding error: {0}")]
    Seed(#[from] keyward_core::StoreError),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

/// Initialize logging for the web server
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyward_web=debug,tower_http=debug,axum=debug".into()),
        )
        .init();
}
