//! Platform roles.

use serde::{Deserialize, Serialize};

/// Role of a platform user, as reported by the host's identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Operates the whole platform, across every tenant.
    SuperAdmin,
    /// Administers a single tenant.
    TenantAdmin,
    /// Regular member of a tenant.
    NormalUser,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SuperAdmin => write!(f, "super_admin"),
            Self::TenantAdmin => write!(f, "tenant_admin"),
            Self::NormalUser => write!(f, "normal_user"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "tenant_admin" => Ok(Self::TenantAdmin),
            "normal_user" => Ok(Self::NormalUser),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}
