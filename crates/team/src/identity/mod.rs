//! Identity oracle seam and request-scoped execution context.
//!
//! The host platform owns users, tenants and roles. This module only
//! describes what the resolution layer needs from it, plus the
//! [`SessionContext`] that carries the acting principal for one request.

pub mod memory;

use std::future::Future;

use team_contacts_core::{TenantId, UserId};

use crate::db::RepositoryError;
use crate::models::{PlatformUser, Principal};

pub use memory::StaticDirectory;

/// Read access to the host's users and their tenant visibility rules.
pub trait IdentityOracle: Send + Sync {
    /// Look up a user by id.
    fn user_by_id(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<PlatformUser>, RepositoryError>> + Send;

    /// Every user of a tenant.
    fn users_in_tenant(
        &self,
        tenant_id: TenantId,
    ) -> impl Future<Output = Result<Vec<PlatformUser>, RepositoryError>> + Send;

    /// Every user of the platform.
    fn all_users(&self) -> impl Future<Output = Result<Vec<PlatformUser>, RepositoryError>> + Send;

    /// Whether `principal` may see anything in `target`'s tenant.
    ///
    /// The system principal and super admins see every tenant; everyone
    /// else only their own.
    fn can_view(&self, principal: &Principal, target: &PlatformUser) -> bool {
        match principal {
            Principal::System => true,
            Principal::User(user) => user.is_super_admin() || user.tenant_id == target.tenant_id,
        }
    }
}

/// The acting principal of one request or lifecycle event.
///
/// Created per request by the host and passed by reference; never stored
/// in a global. A context is immutable: elevation hands out a separate
/// context instead of changing this one, so overlapping calls sharing a
/// session never observe each other's elevation.
#[derive(Debug, Clone)]
pub struct SessionContext {
    principal: Principal,
}

impl SessionContext {
    /// Context acting as the given principal.
    #[must_use]
    pub const fn new(principal: Principal) -> Self {
        Self { principal }
    }

    /// Context acting as an authenticated user.
    #[must_use]
    pub const fn for_user(user: PlatformUser) -> Self {
        Self::new(Principal::User(user))
    }

    /// Context acting as the platform itself.
    #[must_use]
    pub const fn system() -> Self {
        Self::new(Principal::System)
    }

    /// Snapshot of the acting principal.
    #[must_use]
    pub fn principal(&self) -> Principal {
        self.principal.clone()
    }

    /// A system-principal context for one elevated call.
    ///
    /// Elevation lasts as long as the returned context; `self` keeps its
    /// principal throughout.
    #[must_use = "elevation only applies to calls made with the returned context"]
    pub fn elevated(&self) -> Self {
        tracing::debug!(on_behalf_of = ?self.principal, "Elevated context to system principal");
        Self::system()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use team_contacts_core::{Email, UserRole};

    use super::*;

    fn user(id: i32, tenant: i32, role: UserRole) -> PlatformUser {
        PlatformUser {
            id: UserId::new(id),
            tenant_id: TenantId::new(tenant),
            role,
            public_id: Email::parse(&format!("user{id}@example.com")).unwrap(),
        }
    }

    #[test]
    fn test_elevated_context_leaves_caller_untouched() {
        let session = SessionContext::for_user(user(1, 1, UserRole::NormalUser));
        {
            let elevated = session.elevated();
            assert!(elevated.principal().is_system());
            assert_eq!(session.principal().user().unwrap().id, UserId::new(1));
        }
        assert_eq!(session.principal().user().unwrap().id, UserId::new(1));
    }

    #[test]
    fn test_overlapping_elevations_are_independent() {
        let session = SessionContext::for_user(user(1, 1, UserRole::TenantAdmin));
        let first = session.elevated();
        let second = session.elevated();
        drop(first);
        assert!(second.principal().is_system());
        assert!(!session.principal().is_system());
        drop(second);
        assert!(!session.principal().is_system());
    }

    #[test]
    fn test_can_view_is_tenant_scoped() {
        let directory = StaticDirectory::default();
        let target = user(2, 2, UserRole::NormalUser);

        assert!(directory.can_view(&Principal::System, &target));
        assert!(directory.can_view(&Principal::User(user(9, 1, UserRole::SuperAdmin)), &target));
        assert!(directory.can_view(&Principal::User(user(3, 2, UserRole::NormalUser)), &target));
        assert!(!directory.can_view(&Principal::User(user(4, 1, UserRole::TenantAdmin)), &target));
    }
}
