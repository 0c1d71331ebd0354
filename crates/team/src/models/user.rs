//! Platform users as reported by the identity oracle.

use serde::{Deserialize, Serialize};

use team_contacts_core::{Email, TenantId, UserId, UserRole};

/// A platform user (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformUser {
    /// Unique user ID.
    pub id: UserId,
    /// Tenant the user belongs to.
    pub tenant_id: TenantId,
    /// Platform role.
    pub role: UserRole,
    /// Public identifier (login e-mail). Join key for the user's team contact.
    pub public_id: Email,
}

impl PlatformUser {
    /// Whether this user is a platform super admin.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.role == UserRole::SuperAdmin
    }

    /// Whether this user administers the given tenant.
    #[must_use]
    pub fn is_tenant_admin_of(&self, tenant_id: TenantId) -> bool {
        self.role == UserRole::TenantAdmin && self.tenant_id == tenant_id
    }
}

/// Who an operation is executed as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// An authenticated platform user.
    User(PlatformUser),
    /// The platform itself, acting on behalf of a user with no session yet.
    System,
}

impl Principal {
    /// The authenticated user, if this is not the system principal.
    #[must_use]
    pub const fn user(&self) -> Option<&PlatformUser> {
        match self {
            Self::User(user) => Some(user),
            Self::System => None,
        }
    }

    /// Whether this principal is the elevated system principal.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }
}
