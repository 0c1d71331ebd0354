//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! tc-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `TEAM_CONTACTS_DATABASE_URL` - `PostgreSQL` connection string
//!   (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! `crates/team/migrations/`:
//! ```text
//! migrations/
//! ├── 20260124000001_create_platform_users.sql
//! ├── 20260124000002_create_contacts.sql
//! └── 20260124000003_create_card_store.sql
//! ```

use thiserror::Error;

use team_contacts::TeamContactsConfig;
use team_contacts::db;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the team contacts migrations.
///
/// Both storage shapes are created, so a deployment can switch backends
/// without another migration.
///
/// # Errors
///
/// Returns `MigrationError` if the connection or any migration fails.
pub async fn run(config: &TeamContactsConfig) -> Result<(), MigrationError> {
    tracing::info!("Connecting to team contacts database...");
    let pool = db::create_pool(&config.database_url).await?;

    tracing::info!("Running team contacts migrations...");
    db::migrate(&pool).await?;

    tracing::info!("Team contacts migrations complete!");
    Ok(())
}
