//! Database operations for team contacts `PostgreSQL`.
//!
//! # Schemas
//!
//! - `platform.user_account` - Host users (read only)
//! - `contacts.address_book` - Team books for the unified backend
//! - `contacts.contact` - Personal contacts, and team contacts in the
//!   unified backend
//! - `carddav.addressbook` / `carddav.card` - Card store for the split
//!   backend
//! - `contacts.contact_card` - Bridge from contacts to cards
//!
//! # Migrations
//!
//! Migrations are stored in `crates/team/migrations/` and run via:
//! ```bash
//! cargo run -p team-contacts-cli -- migrate
//! ```

pub mod card_store;
mod rows;
pub mod sql;
pub mod unified;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use team_contacts_core::Email;

pub use card_store::PgCardStore;
pub use unified::PgUnifiedStore;
pub use users::PgDirectory;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// The store refused the call without reaching the database.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply the embedded migrations.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Parse an e-mail column, flagging bad rows as corruption.
pub(crate) fn parse_email(raw: &str) -> Result<Email, RepositoryError> {
    Email::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}
