//! Bootstrap role seeding

use crate::{error::StoreError, store::IdentityStore};
use tracing::info;

/// Baseline roles that must exist before the service accepts traffic
pub const DEFAULT_ROLES: [&str; 2] = ["Admin", "User"];

/// Idempotently ensure the baseline roles exist
///
/// Runs once at startup, before the listener binds. Any store failure here
/// is fatal: role-based authorization depends on these roles existing.
pub async fn seed_roles(store: &dyn IdentityStore) -> Result<(), StoreError> {
    for role in DEFAULT_ROLES {
        if store.find_role(role).await?.is_none() {
            store.create_role(role).await?;
            info!("seeded role: {}", role);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryIdentityStore;

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let store = MemoryIdentityStore::new();

        seed_roles(&store).await.unwrap();
        seed_roles(&store).await.unwrap();

        let names: Vec<String> = store
            .list_roles()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Admin", "User"]);
    }
}
