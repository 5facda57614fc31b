//! Authentication endpoints: login, register, logout, refresh

use crate::{error::ApiError, AppState};
use axum::{extract::State, response::Json};
use keyward_core::{NewUser, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Exchange credentials for a signed token
///
/// Both failure modes answer 401, but with distinct error codes so a client
/// can tell an unknown account from a bad password.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .store
        .verify_credentials(&request.username, &request.password)
        .await
        .map_err(|e| match e {
            StoreError::UserNotFound => {
                warn!("login failed, unknown user: {}", request.username);
                ApiError::UnknownUser
            }
            StoreError::WrongPassword => ApiError::WrongPassword,
            other => other.into(),
        })?;

    let token = state.tokens.issue(state.store.as_ref(), &user).await?;
    info!("user logged in: {}", user.username);
    Ok(Json(TokenResponse { token }))
}

/// Create an account and log it in immediately
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .store
        .create_user(NewUser {
            username: request.username,
            email: request.email,
            password: request.password,
        })
        .await?;

    let token = state.tokens.issue(state.store.as_ref(), &user).await?;
    info!("user registered: {}", user.username);
    Ok(Json(TokenResponse { token }))
}

/// Stateless logout; token invalidation is the client's responsibility
pub async fn logout() -> Json<Value> {
    Json(json!({
        "message": "Logged out successfully."
    }))
}

/// Placeholder until refresh tokens are issued alongside access tokens
pub async fn refresh_token() -> Json<Value> {
    Json(json!({
        "message": "Refresh token is not implemented."
    }))
}
