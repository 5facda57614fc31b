//! Identity store contract and the in-memory reference implementation

use crate::{
    error::StoreError,
    types::{ClaimEntry, NewUser, RoleRecord, UserRecord},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Pluggable identity storage
///
/// Persists users, roles, per-user claims, and per-role claims. The token
/// issuer and the HTTP layer only talk to this trait; backends decide how
/// the data is actually stored.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Create a user after validating and hashing the supplied credentials
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, StoreError>;
    async fn update_user(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
    ) -> Result<(), StoreError>;
    async fn delete_user(&self, user_id: &str) -> Result<(), StoreError>;

    /// Check a username/password pair
    ///
    /// Fails with `UserNotFound` or `WrongPassword` so the caller can report
    /// which factor failed.
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserRecord, StoreError>;

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError>;
    async fn find_role(&self, name: &str) -> Result<Option<RoleRecord>, StoreError>;
    async fn create_role(&self, name: &str) -> Result<RoleRecord, StoreError>;
    async fn add_to_role(&self, user_id: &str, role: &str) -> Result<(), StoreError>;
    async fn remove_from_role(&self, user_id: &str, role: &str) -> Result<(), StoreError>;
    /// Role names held by the user
    async fn user_roles(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// Claims attached directly to the user
    async fn user_claims(&self, user_id: &str) -> Result<Vec<ClaimEntry>, StoreError>;
    async fn add_user_claim(&self, user_id: &str, claim: ClaimEntry) -> Result<(), StoreError>;
    async fn remove_user_claim(&self, user_id: &str, claim: &ClaimEntry)
        -> Result<(), StoreError>;
    /// Claims owned by the role; empty when the role does not exist
    async fn role_claims(&self, role: &str) -> Result<Vec<ClaimEntry>, StoreError>;
    async fn add_role_claim(&self, role: &str, claim: ClaimEntry) -> Result<(), StoreError>;
}

/// Field checks shared by user creation and profile update
pub fn validate_profile(username: &str, email: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if username.trim().is_empty() {
        errors.push("username must not be empty".to_string());
    }
    if email.trim().is_empty() || !email.contains('@') {
        errors.push("email must be a valid address".to_string());
    }

    errors
}

/// Validate a registration/creation request
///
/// All violations are collected into one structured error list so the caller
/// can surface them together.
pub fn validate_new_user(new_user: &NewUser) -> Result<(), StoreError> {
    let mut errors = validate_profile(&new_user.username, &new_user.email);

    if new_user.password.len() < 6 {
        errors.push("password must be at least 6 characters".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(errors))
    }
}

/// Hash password using Argon2
pub fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Backend(format!("password hashing failed: {}", e)))
}

/// Verify password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, StoreError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| StoreError::Backend(format!("malformed password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Default)]
struct MemoryInner {
    /// Keyed by lowercased username; usernames are unique case-insensitively
    users: HashMap<String, UserRecord>,
    roles: HashMap<String, RoleRecord>,
    /// user id -> role names
    memberships: HashMap<String, BTreeSet<String>>,
    user_claims: HashMap<String, Vec<ClaimEntry>>,
    role_claims: HashMap<String, Vec<ClaimEntry>>,
}

/// In-memory identity store for development and testing
#[derive(Clone, Default)]
pub struct MemoryIdentityStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.users.get(&username.to_lowercase()).cloned())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.users.values().find(|u| u.id == user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut users: Vec<_> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, StoreError> {
        validate_new_user(&new_user)?;

        let password_hash = hash_password(&new_user.password)?;
        let mut inner = self.inner.write().unwrap();

        let key = new_user.username.to_lowercase();
        if inner.users.contains_key(&key) {
            debug!("registration rejected: username '{}' taken", new_user.username);
            return Err(StoreError::Validation(vec![format!(
                "username '{}' is already taken",
                new_user.username
            )]));
        }
        if inner.users.values().any(|u| u.email == new_user.email) {
            debug!("registration rejected: email '{}' taken", new_user.email);
            return Err(StoreError::Validation(vec![format!(
                "email '{}' is already registered",
                new_user.email
            )]));
        }

        let record = UserRecord::new(new_user.username, new_user.email, password_hash);
        inner.users.insert(key, record.clone());
        info!("created user: {}", record.username);
        Ok(record)
    }

    async fn update_user(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();

        let old_key = inner
            .users
            .iter()
            .find(|(_, u)| u.id == user_id)
            .map(|(k, _)| k.clone())
            .ok_or(StoreError::UserNotFound)?;

        let new_key = username.to_lowercase();
        let username_taken = inner
            .users
            .get(&new_key)
            .is_some_and(|other| other.id != user_id);
        let email_taken = inner
            .users
            .values()
            .any(|other| other.email == email && other.id != user_id);

        let mut errors = validate_profile(username, email);
        if username_taken {
            errors.push(format!("username '{}' is already taken", username));
        }
        if email_taken {
            errors.push(format!("email '{}' is already registered", email));
        }
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }

        let mut record = inner.users.remove(&old_key).unwrap();
        record.username = username.to_string();
        record.email = email.to_string();
        inner.users.insert(new_key, record);
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();

        let key = inner
            .users
            .iter()
            .find(|(_, u)| u.id == user_id)
            .map(|(k, _)| k.clone())
            .ok_or(StoreError::UserNotFound)?;

        inner.users.remove(&key);
        inner.memberships.remove(user_id);
        inner.user_claims.remove(user_id);
        Ok(())
    }

    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserRecord, StoreError> {
        let user = self
            .find_by_username(username)
            .await?
            .ok_or(StoreError::UserNotFound)?;

        if !verify_password(password, &user.password_hash)? {
            warn!("invalid password for user: {}", username);
            return Err(StoreError::WrongPassword);
        }

        debug!("user authenticated: {}", username);
        Ok(user)
    }

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut roles: Vec<_> = inner.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn find_role(&self, name: &str) -> Result<Option<RoleRecord>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.roles.get(name).cloned())
    }

    async fn create_role(&self, name: &str) -> Result<RoleRecord, StoreError> {
        let mut inner = self.inner.write().unwrap();
        if inner.roles.contains_key(name) {
            return Err(StoreError::Validation(vec![format!(
                "role '{}' already exists",
                name
            )]));
        }

        let record = RoleRecord::new(name);
        inner.roles.insert(name.to_string(), record.clone());
        info!("created role: {}", name);
        Ok(record)
    }

    async fn add_to_role(&self, user_id: &str, role: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.users.values().any(|u| u.id == user_id) {
            return Err(StoreError::UserNotFound);
        }
        if !inner.roles.contains_key(role) {
            return Err(StoreError::RoleNotFound);
        }

        let roles = inner.memberships.entry(user_id.to_string()).or_default();
        if !roles.insert(role.to_string()) {
            return Err(StoreError::Validation(vec![format!(
                "user is already in role '{}'",
                role
            )]));
        }
        Ok(())
    }

    async fn remove_from_role(&self, user_id: &str, role: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.users.values().any(|u| u.id == user_id) {
            return Err(StoreError::UserNotFound);
        }
        if !inner.roles.contains_key(role) {
            return Err(StoreError::RoleNotFound);
        }

        let removed = inner
            .memberships
            .get_mut(user_id)
            .is_some_and(|roles| roles.remove(role));
        if !removed {
            return Err(StoreError::Validation(vec![format!(
                "user is not in role '{}'",
                role
            )]));
        }
        Ok(())
    }

    async fn user_roles(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .memberships
            .get(user_id)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn user_claims(&self, user_id: &str) -> Result<Vec<ClaimEntry>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.user_claims.get(user_id).cloned().unwrap_or_default())
    }

    async fn add_user_claim(&self, user_id: &str, claim: ClaimEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.users.values().any(|u| u.id == user_id) {
            return Err(StoreError::UserNotFound);
        }
        inner
            .user_claims
            .entry(user_id.to_string())
            .or_default()
            .push(claim);
        Ok(())
    }

    async fn remove_user_claim(
        &self,
        user_id: &str,
        claim: &ClaimEntry,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.users.values().any(|u| u.id == user_id) {
            return Err(StoreError::UserNotFound);
        }
        if let Some(claims) = inner.user_claims.get_mut(user_id) {
            claims.retain(|c| c != claim);
        }
        Ok(())
    }

    async fn role_claims(&self, role: &str) -> Result<Vec<ClaimEntry>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.role_claims.get(role).cloned().unwrap_or_default())
    }

    async fn add_role_claim(&self, role: &str, claim: ClaimEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.roles.contains_key(role) {
            return Err(StoreError::RoleNotFound);
        }
        inner
            .role_claims
            .entry(role.to_string())
            .or_default()
            .push(claim);
        Ok(())
    }
}
