//! Domain types shared across identity storage, token issuance, and the HTTP layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal user record with password hash
///
/// The hash is owned by the identity store and never leaves it; list and
/// lookup endpoints serialize [`UserInfo`] instead.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Create a new record with a fresh identifier
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }

    /// Convert to public user info
    pub fn to_user_info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// Input for user creation; the store hashes the password
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Public user information
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A named role; claims attached to it propagate to every member
#[derive(Debug, Clone, Serialize)]
pub struct RoleRecord {
    pub id: String,
    pub name: String,
}

impl RoleRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
        }
    }
}

/// A (type, value) claim pair
///
/// Multiple claims of the same type may coexist; a claim is attached either
/// directly to a user or inherited through one of the user's roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimEntry {
    pub claim_type: String,
    pub claim_value: String,
}

impl ClaimEntry {
    pub fn new(claim_type: impl Into<String>, claim_value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            claim_value: claim_value.into(),
        }
    }
}
