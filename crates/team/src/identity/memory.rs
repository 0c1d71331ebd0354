//! In-memory identity oracle.
//!
//! Backs tests and embedded hosts that keep their user list in process.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use team_contacts_core::{TenantId, UserId};

use super::IdentityOracle;
use crate::db::RepositoryError;
use crate::models::PlatformUser;

/// A user directory held in memory.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: RwLock<BTreeMap<UserId, PlatformUser>>,
}

impl StaticDirectory {
    /// Directory pre-populated with `users`.
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = PlatformUser>) -> Self {
        let directory = Self::default();
        for user in users {
            directory.insert(user);
        }
        directory
    }

    /// Add or replace a user.
    pub fn insert(&self, user: PlatformUser) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.id, user);
    }

    /// Remove a user, returning it if present.
    pub fn remove(&self, id: UserId) -> Option<PlatformUser> {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    fn snapshot(&self) -> Vec<PlatformUser> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl IdentityOracle for StaticDirectory {
    async fn user_by_id(&self, id: UserId) -> Result<Option<PlatformUser>, RepositoryError> {
        Ok(self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }

    async fn users_in_tenant(&self, tenant_id: TenantId) -> Result<Vec<PlatformUser>, RepositoryError> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|user| user.tenant_id == tenant_id)
            .collect())
    }

    async fn all_users(&self) -> Result<Vec<PlatformUser>, RepositoryError> {
        Ok(self.snapshot())
    }
}
