//! HTTP-facing error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keyward_core::{StoreError, TokenError};
use serde_json::json;

/// Request-level errors surfaced to API clients
///
/// `UnknownUser` and `WrongPassword` both answer 401, but carry different
/// error codes: the login surface deliberately reveals which factor failed.
/// `UserNotFound` is the 404 variant used by the CRUD endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("user not found")]
    UnknownUser,
    #[error("incorrect password")]
    WrongPassword,
    #[error("user not found")]
    UserNotFound,
    #[error("role not found")]
    RoleNotFound,
    #[error("validation failed")]
    Validation(Vec<String>),
    #[error("missing authorization header")]
    MissingAuthHeader,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("policy '{0}' denied the request")]
    Forbidden(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserNotFound => ApiError::UserNotFound,
            StoreError::RoleNotFound => ApiError::RoleNotFound,
            StoreError::WrongPassword => ApiError::WrongPassword,
            StoreError::Validation(errors) => ApiError::Validation(errors),
            StoreError::Backend(message) => ApiError::Internal(message),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => ApiError::InvalidToken,
            TokenError::Expired => ApiError::TokenExpired,
            TokenError::Creation => ApiError::Internal("token creation failed".to_string()),
            TokenError::Store(store) => store.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Structured validation failures carry the full error list
        if let ApiError::Validation(errors) = &self {
            let body = Json(json!({
                "error": "validation_failed",
                "message": "One or more fields failed validation",
                "errors": errors,
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        let (status, error_code, message) = match &self {
            ApiError::UnknownUser => (
                StatusCode::UNAUTHORIZED,
                "user_not_found",
                "User not found".to_string(),
            ),
            ApiError::WrongPassword => (
                StatusCode::UNAUTHORIZED,
                "wrong_password",
                "Incorrect password".to_string(),
            ),
            ApiError::UserNotFound => (
                StatusCode::NOT_FOUND,
                "user_not_found",
                "User not found".to_string(),
            ),
            ApiError::RoleNotFound => (
                StatusCode::NOT_FOUND,
                "role_not_found",
                "Role not found".to_string(),
            ),
            ApiError::MissingAuthHeader => (
                StatusCode::UNAUTHORIZED,
                "missing_auth_header",
                "Authorization header is required".to_string(),
            ),
            ApiError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid or malformed token".to_string(),
            ),
            ApiError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "token_expired",
                "Token has expired".to_string(),
            ),
            ApiError::Forbidden(policy) => (
                StatusCode::FORBIDDEN,
                "forbidden",
                format!("Policy '{}' denied the request", policy),
            ),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
            ApiError::Validation(_) => unreachable!(),
        };

        let body = Json(json!({
            "error": error_code,
            "message": message,
        }));

        (status, body).into_response()
    }
}
