//! User, role, and claim management endpoints

use crate::{error::ApiError, AppState};
use axum::{
    extract::{Path, State},
    response::Json,
};
use keyward_core::{ClaimEntry, NewUser, RoleRecord, UserInfo};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub user_id: String,
    pub role_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub email: String,
    pub claim_type: String,
    pub claim_value: String,
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserInfo>>, ApiError> {
    let users = state.store.list_users().await?;
    Ok(Json(users.iter().map(|u| u.to_user_info()).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .create_user(NewUser {
            username: request.username,
            email: request.email,
            password: request.password,
        })
        .await?;

    Ok(Json(json!({ "message": "User created successfully!" })))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .update_user(&user_id, &request.username, &request.email)
        .await?;

    Ok(Json(json!({ "message": "User updated successfully!" })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.store.delete_user(&user_id).await?;
    info!("deleted user: {}", user_id);
    Ok(Json(json!({ "message": "User deleted successfully!" })))
}

pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<RoleRecord>>, ApiError> {
    let roles = state.store.list_roles().await?;
    Ok(Json(roles))
}

pub async fn add_role(
    State(state): State<AppState>,
    Json(request): Json<RoleAssignment>,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .add_to_role(&request.user_id, &request.role_name)
        .await?;

    info!("added user {} to role {}", request.user_id, request.role_name);
    Ok(Json(json!({ "message": "Role added to user!" })))
}

pub async fn remove_role(
    State(state): State<AppState>,
    Json(request): Json<RoleAssignment>,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .remove_from_role(&request.user_id, &request.role_name)
        .await?;

    info!(
        "removed user {} from role {}",
        request.user_id, request.role_name
    );
    Ok(Json(json!({ "message": "Role removed from user!" })))
}

/// Direct claims for the user with the given email; inherited role claims
/// are not included here, only in issued tokens.
pub async fn get_claims(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<ClaimEntry>>, ApiError> {
    let user = state
        .store
        .find_by_email(&email)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let claims = state.store.user_claims(&user.id).await?;
    Ok(Json(claims))
}

pub async fn add_claim(
    State(state): State<AppState>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .store
        .find_by_email(&request.email)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    state
        .store
        .add_user_claim(
            &user.id,
            ClaimEntry::new(request.claim_type, request.claim_value),
        )
        .await?;

    Ok(Json(json!({ "message": "Claim added successfully." })))
}

pub async fn remove_claim(
    State(state): State<AppState>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .store
        .find_by_email(&request.email)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    state
        .store
        .remove_user_claim(
            &user.id,
            &ClaimEntry::new(request.claim_type, request.claim_value),
        )
        .await?;

    Ok(Json(json!({ "message": "Claim removed successfully." })))
}
