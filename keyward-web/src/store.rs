//! SQLite-backed identity store

use chrono::{DateTime, Utc};
use keyward_core::{
    async_trait, hash_password, validate_new_user, validate_profile, verify_password, ClaimEntry,
    IdentityStore, NewUser, RoleRecord, StoreError, UserRecord,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, error, info, warn};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE COLLATE NOCASE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        user_id TEXT NOT NULL,
        role_id TEXT NOT NULL,
        PRIMARY KEY (user_id, role_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_claims (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        claim_type TEXT NOT NULL,
        claim_value TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_claims (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        role_id TEXT NOT NULL,
        claim_type TEXT NOT NULL,
        claim_value TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_username ON users(username)",
    "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
    "CREATE INDEX IF NOT EXISTS idx_user_claims_user ON user_claims(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_role_claims_role ON role_claims(role_id)",
];

/// Database-backed identity store
#[derive(Debug, Clone)]
pub struct SqliteIdentityStore {
    pool: SqlitePool,
}

impl SqliteIdentityStore {
    /// Create the store and its tables
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    error!("failed to create identity tables: {}", e);
                    backend(e)
                })?;
        }

        info!("identity tables ready");
        Ok(())
    }

    async fn fetch_user(&self, column: &str, value: &str) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT * FROM users WHERE {} = ?", column);
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(user_from_row).transpose()
    }

    async fn fetch_role(&self, name: &str) -> Result<Option<RoleRecord>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.map(|row| RoleRecord {
            id: row.get("id"),
            name: row.get("name"),
        }))
    }

    async fn username_taken(&self, username: &str, except_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users WHERE username = ? AND id != ?")
            .bind(username)
            .bind(except_id)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn email_taken(&self, email: &str, except_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users WHERE email = ? AND id != ?")
            .bind(email)
            .bind(except_id)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn user_from_row(row: sqlx::sqlite::SqliteRow) -> Result<UserRecord, StoreError> {
    let created_at: String = row.get("created_at");
    let created_at: DateTime<Utc> = created_at
        .parse()
        .map_err(|e| StoreError::Backend(format!("malformed created_at: {}", e)))?;

    Ok(UserRecord {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at,
    })
}

fn claims_from_rows(rows: Vec<sqlx::sqlite::SqliteRow>) -> Vec<ClaimEntry> {
    rows.into_iter()
        .map(|row| ClaimEntry {
            claim_type: row.get("claim_type"),
            claim_value: row.get("claim_value"),
        })
        .collect()
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        self.fetch_user("username", username).await
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.fetch_user("id", user_id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.fetch_user("email", email).await
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.into_iter().map(user_from_row).collect()
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, StoreError> {
        validate_new_user(&new_user)?;

        if self.username_taken(&new_user.username, "").await? {
            debug!("registration rejected: username '{}' taken", new_user.username);
            return Err(StoreError::Validation(vec![format!(
                "username '{}' is already taken",
                new_user.username
            )]));
        }
        if self.email_taken(&new_user.email, "").await? {
            debug!("registration rejected: email '{}' taken", new_user.email);
            return Err(StoreError::Validation(vec![format!(
                "email '{}' is already registered",
                new_user.email
            )]));
        }

        let password_hash = hash_password(&new_user.password)?;
        let record = UserRecord::new(new_user.username, new_user.email, password_hash);

        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.username)
        .bind(&record.email)
        .bind(&record.password_hash)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        info!("created user: {}", record.username);
        Ok(record)
    }

    async fn update_user(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
    ) -> Result<(), StoreError> {
        if self.find_by_id(user_id).await?.is_none() {
            return Err(StoreError::UserNotFound);
        }

        let mut errors = validate_profile(username, email);
        if self.username_taken(username, user_id).await? {
            errors.push(format!("username '{}' is already taken", username));
        }
        if self.email_taken(email, user_id).await? {
            errors.push(format!("email '{}' is already registered", email));
        }
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }

        sqlx::query("UPDATE users SET username = ?, email = ? WHERE id = ?")
            .bind(username)
            .bind(email)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), StoreError> {
        // Memberships and claims go first; SQLite foreign keys are not relied on
        sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        sqlx::query("DELETE FROM user_claims WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound);
        }
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
        let rows = sqlx::query("SELECT id, name FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(|row| RoleRecord {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }

    async fn find_role(&self, name: &str) -> Result<Option<RoleRecord>, StoreError> {
        self.fetch_role(name).await
    }

    async fn create_role(&self, name: &str) -> Result<RoleRecord, StoreError> {
        if self.fetch_role(name).await?.is_some() {
            return Err(StoreError::Validation(vec![format!(
                "role '{}' already exists",
                name
            )]));
        }

        let record = RoleRecord::new(name);
        sqlx::query("INSERT INTO roles (id, name) VALUES (?, ?)")
            .bind(&record.id)
            .bind(&record.name)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        info!("created role: {}", name);
        Ok(record)
    }

    async fn add_to_role(&self, user_id: &str, role: &str) -> Result<(), StoreError> {
        if self.find_by_id(user_id).await?.is_none() {
            return Err(StoreError::UserNotFound);
        }
        let role = self.fetch_role(role).await?.ok_or(StoreError::RoleNotFound)?;

        let result = sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(&role.id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Validation(vec![format!(
                "user is already in role '{}'",
                role.name
            )]));
        }
        Ok(())
    }

    async fn remove_from_role(&self, user_id: &str, role: &str) -> Result<(), StoreError> {
        if self.find_by_id(user_id).await?.is_none() {
            return Err(StoreError::UserNotFound);
        }
        let role = self.fetch_role(role).await?.ok_or(StoreError::RoleNotFound)?;

        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
            .bind(user_id)
            .bind(&role.id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Validation(vec![format!(
                "user is not in role '{}'",
                role.name
            )]));
        }
        Ok(())
    }

    async fn user_roles(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT r.name FROM roles r \
             JOIN user_roles ur ON ur.role_id = r.id \
             WHERE ur.user_id = ? ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(|row| row.get("name")).collect())
    }

    async fn user_claims(&self, user_id: &str) -> Result<Vec<ClaimEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT claim_type, claim_value FROM user_claims WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(claims_from_rows(rows))
    }

    async fn add_user_claim(&self, user_id: &str, claim: ClaimEntry) -> Result<(), StoreError> {
        if self.find_by_id(user_id).await?.is_none() {
            return Err(StoreError::UserNotFound);
        }

        sqlx::query("INSERT INTO user_claims (user_id, claim_type, claim_value) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(&claim.claim_type)
            .bind(&claim.claim_value)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn remove_user_claim(
        &self,
        user_id: &str,
        claim: &ClaimEntry,
    ) -> Result<(), StoreError> {
        if self.find_by_id(user_id).await?.is_none() {
            return Err(StoreError::UserNotFound);
        }

        sqlx::query(
            "DELETE FROM user_claims WHERE user_id = ? AND claim_type = ? AND claim_value = ?",
        )
        .bind(user_id)
        .bind(&claim.claim_type)
        .bind(&claim.claim_value)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn role_claims(&self, role: &str) -> Result<Vec<ClaimEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT rc.claim_type, rc.claim_value FROM role_claims rc \
             JOIN roles r ON r.id = rc.role_id \
             WHERE r.name = ? ORDER BY rc.id",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(claims_from_rows(rows))
    }

    async fn add_role_claim(&self, role: &str, claim: ClaimEntry) -> Result<(), StoreError> {
        let role = self.fetch_role(role).await?.ok_or(StoreError::RoleNotFound)?;

        sqlx::query("INSERT INTO role_claims (role_id, claim_type, claim_value) VALUES (?, ?, ?)")
            .bind(&role.id)
            .bind(&claim.claim_type)
            .bind(&claim.claim_value)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn test_store() -> SqliteIdentityStore {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .unwrap();
        SqliteIdentityStore::new(pool).await.unwrap()
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() {
        let store = test_store().await;
        store.create_tables().await.unwrap();
    }

    #[tokio::test]
    async fn test_roundtrip_user() {
        let store = test_store().await;
        let created = store
            .create_user(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let fetched = store.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.username, "alice");
        assert_eq!(fetched.email, "alice@example.com");
        assert_eq!(fetched.created_at.timestamp(), created.created_at.timestamp());
    }

    #[tokio::test]
    async fn test_usernames_unique_case_insensitively() {
        let store = test_store().await;
        store
            .create_user(new_user("Alice", "alice@example.com"))
            .await
            .unwrap();

        assert!(store.find_by_username("ALICE").await.unwrap().is_some());

        let duplicate = store
            .create_user(new_user("alice", "other@example.com"))
            .await;
        assert!(matches!(duplicate, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_rejects_malformed_fields() {
        let store = test_store().await;
        let user = store
            .create_user(new_user("frank", "frank@example.com"))
            .await
            .unwrap();

        let result = store.update_user(&user.id, "", "not-an-email").await;
        assert!(matches!(result, Err(StoreError::Validation(_))));

        let unchanged = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(unchanged.username, "frank");
        assert_eq!(unchanged.email, "frank@example.com");

        store
            .update_user(&user.id, "franklin", "franklin@example.com")
            .await
            .unwrap();
        assert!(store.find_by_username("franklin").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_credentials() {
        let store = test_store().await;
        store
            .create_user(new_user("bob", "bob@example.com"))
            .await
            .unwrap();

        assert!(matches!(
            store.verify_credentials("nobody", "password123").await,
            Err(StoreError::UserNotFound)
        ));
        assert!(matches!(
            store.verify_credentials("bob", "nope").await,
            Err(StoreError::WrongPassword)
        ));
        assert!(store
            .verify_credentials("bob", "password123")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_roles_memberships_and_claims() {
        let store = test_store().await;
        let user = store
            .create_user(new_user("carol", "carol@example.com"))
            .await
            .unwrap();
        store.create_role("Admin").await.unwrap();

        store.add_to_role(&user.id, "Admin").await.unwrap();
        assert_eq!(store.user_roles(&user.id).await.unwrap(), vec!["Admin"]);
        assert!(matches!(
            store.add_to_role(&user.id, "Admin").await,
            Err(StoreError::Validation(_))
        ));

        store
            .add_role_claim("Admin", ClaimEntry::new("Tempo", "Inserir"))
            .await
            .unwrap();
        store
            .add_user_claim(&user.id, ClaimEntry::new("department", "ops"))
            .await
            .unwrap();

        assert_eq!(
            store.role_claims("Admin").await.unwrap(),
            vec![ClaimEntry::new("Tempo", "Inserir")]
        );
        assert!(store.role_claims("Ghost").await.unwrap().is_empty());
        assert_eq!(
            store.user_claims(&user.id).await.unwrap(),
            vec![ClaimEntry::new("department", "ops")]
        );

        store.remove_from_role(&user.id, "Admin").await.unwrap();
        assert!(store.user_roles(&user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_user_cleans_up() {
        let store = test_store().await;
        let user = store
            .create_user(new_user("dave", "dave@example.com"))
            .await
            .unwrap();
        store.create_role("User").await.unwrap();
        store.add_to_role(&user.id, "User").await.unwrap();
        store
            .add_user_claim(&user.id, ClaimEntry::new("Tempo", "Inserir"))
            .await
            .unwrap();

        store.delete_user(&user.id).await.unwrap();

        assert!(store.find_by_id(&user.id).await.unwrap().is_none());
        assert!(store.user_roles(&user.id).await.unwrap().is_empty());
        assert!(store.user_claims(&user.id).await.unwrap().is_empty());
        assert!(matches!(
            store.delete_user(&user.id).await,
            Err(StoreError::UserNotFound)
        ));
    }
}
