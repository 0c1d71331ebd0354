//! Self contact backfill command.
//!
//! Runs the same scan as the host's bootstrap hook, as the system
//! principal, against the configured backend.
//!
//! # Usage
//!
//! ```bash
//! tc-cli sync
//! tc-cli sync --tenant 7
//! tc-cli sync --user 42
//! ```

use thiserror::Error;
use tracing::info;

use team_contacts::db::{self, PgCardStore, PgDirectory, PgUnifiedStore};
use team_contacts::identity::SessionContext;
use team_contacts::services::BootstrapReport;
use team_contacts::store::SharedContactStore;
use team_contacts::{BackendKind, TeamContacts, TeamContactsConfig, TeamContactsError, TeamPolicy};
use team_contacts_core::{TenantId, UserId};

/// Errors that can occur during a backfill.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Team contacts error: {0}")]
    TeamContacts(#[from] TeamContactsError),

    #[error("{0} user(s) could not be synced")]
    Incomplete(usize),
}

/// Which users a backfill covers.
#[derive(Debug, Clone, Copy)]
pub enum SyncScope {
    All,
    Tenant(TenantId),
    User(UserId),
}

/// Run the backfill.
///
/// # Errors
///
/// Returns `SyncError::Incomplete` if any user failed to sync; the
/// failures are in the logs.
pub async fn run(config: &TeamContactsConfig, scope: SyncScope) -> Result<(), SyncError> {
    tracing::info!("Connecting to team contacts database...");
    let pool = db::create_pool(&config.database_url).await?;
    let directory = PgDirectory::new(pool.clone());

    let report = match config.backend {
        BackendKind::Unified => {
            sync_with(PgUnifiedStore::new(pool), directory, config.policy.clone(), scope).await?
        }
        BackendKind::CardStore => {
            sync_with(PgCardStore::new(pool), directory, config.policy.clone(), scope).await?
        }
    };

    let summary = serde_json::to_string(&report).unwrap_or_default();
    info!(report = %summary, "Sync finished");

    if report.failed > 0 {
        return Err(SyncError::Incomplete(report.failed));
    }
    Ok(())
}

async fn sync_with<S: SharedContactStore>(
    store: S,
    directory: PgDirectory,
    policy: TeamPolicy,
    scope: SyncScope,
) -> Result<BootstrapReport, SyncError> {
    let team = TeamContacts::new(store, directory, policy);

    let report = match scope {
        SyncScope::All => team.bootstrap(&SessionContext::system()).await?,
        SyncScope::Tenant(tenant_id) => team.bootstrap_tenant(tenant_id).await?,
        SyncScope::User(user_id) => {
            let outcome = team
                .provision_user(&SessionContext::system(), user_id)
                .await?;
            let mut report = BootstrapReport {
                scanned: 1,
                ..BootstrapReport::default()
            };
            report.record(&outcome);
            report
        }
    };
    Ok(report)
}
