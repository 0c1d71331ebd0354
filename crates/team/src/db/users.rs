//! Identity oracle backed by the host's `platform.user_account` table.

use sqlx::PgPool;

use team_contacts_core::{TenantId, UserId, UserRole};

use super::{RepositoryError, parse_email};
use crate::identity::IdentityOracle;
use crate::models::PlatformUser;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    tenant_id: TenantId,
    role: String,
    public_id: String,
}

impl TryFrom<UserRow> for PlatformUser {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: UserRole = row.role.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid role for user {}: {e}", row.id))
        })?;
        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            role,
            public_id: parse_email(&row.public_id)?,
        })
    }
}

fn users(rows: Vec<UserRow>) -> Result<Vec<PlatformUser>, RepositoryError> {
    rows.into_iter().map(PlatformUser::try_from).collect()
}

/// Reads platform users straight from the host database.
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    /// Create a directory over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl IdentityOracle for PgDirectory {
    async fn user_by_id(&self, id: UserId) -> Result<Option<PlatformUser>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, tenant_id, role, public_id FROM platform.user_account WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PlatformUser::try_from).transpose()
    }

    async fn users_in_tenant(&self, tenant_id: TenantId) -> Result<Vec<PlatformUser>, RepositoryError> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, tenant_id, role, public_id FROM platform.user_account \
             WHERE tenant_id = $1 ORDER BY id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        users(rows)
    }

    async fn all_users(&self) -> Result<Vec<PlatformUser>, RepositoryError> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, tenant_id, role, public_id FROM platform.user_account ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        users(rows)
    }
}
