//! Error taxonomy for the identity layer
//!
//! Failures are terminal for the originating request; nothing in this layer
//! retries. The HTTP crate maps these onto response statuses.

use thiserror::Error;

/// Identity store failures
///
/// `UserNotFound` and `WrongPassword` are deliberately distinct variants so
/// the login surface can report which factor failed, even when both map to
/// the same HTTP status.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    UserNotFound,

    #[error("role not found")]
    RoleNotFound,

    #[error("incorrect password")]
    WrongPassword,

    #[error("validation failed: {0:?}")]
    Validation(Vec<String>),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Token issuance and verification failures
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token creation failed")]
    Creation,

    #[error("invalid token")]
    Invalid,

    #[error("token expired")]
    Expired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Policy registry failures
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("unknown policy '{0}'")]
    UnknownPolicy(String),
}

/// Startup configuration failures; these abort the process, never a request
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT signing secret is not configured (set KEYWARD_JWT_SECRET)")]
    MissingSecret,
}
