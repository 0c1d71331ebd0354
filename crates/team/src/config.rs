//! Team contacts configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TEAM_CONTACTS_DATABASE_URL` - `PostgreSQL` connection string
//!   (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `TEAM_CONTACTS_BACKEND` - `unified` (default) or `card_store`
//! - `TEAM_CONTACTS_ALLOW_EDIT_BY_TENANT_ADMINS` - Let tenant admins edit
//!   other users' team contacts (default: false)
//! - `TEAM_CONTACTS_BOOK_URI` - Slug of the team book (default: gab)
//! - `TEAM_CONTACTS_BOOK_DISPLAY_NAME` - Display name of a newly created
//!   team book (default: Team)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_BOOK_URI: &str = "gab";
const DEFAULT_BOOK_DISPLAY_NAME: &str = "Team";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Which storage shape the team book lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Shared and personal contacts in one table keyed by address book.
    Unified,
    /// Shared contacts in a card store, bridged into the contacts table.
    CardStore,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unified" => Ok(Self::Unified),
            "card_store" | "cardstore" | "carddav" => Ok(Self::CardStore),
            other => Err(format!("expected `unified` or `card_store`, got `{other}`")),
        }
    }
}

/// Policy knobs consumed by the resolution services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamPolicy {
    /// `AllowEditTeamContactsByTenantAdmins`: tenant admins may edit other
    /// users' team contacts inside their own tenant.
    pub allow_edit_by_tenant_admins: bool,
    /// Slug under the tenant principal that names the team book.
    pub book_uri: String,
    /// Display name given to a team book when it is provisioned.
    pub book_display_name: String,
}

impl Default for TeamPolicy {
    fn default() -> Self {
        Self {
            allow_edit_by_tenant_admins: false,
            book_uri: DEFAULT_BOOK_URI.to_string(),
            book_display_name: DEFAULT_BOOK_DISPLAY_NAME.to_string(),
        }
    }
}

impl TeamPolicy {
    /// Policy with the tenant admin override switched on or off.
    #[must_use]
    pub fn with_tenant_admin_edits(mut self, allow: bool) -> Self {
        self.allow_edit_by_tenant_admins = allow;
        self
    }
}

/// Full team contacts configuration.
#[derive(Debug, Clone)]
pub struct TeamContactsConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Storage shape of the team book
    pub backend: BackendKind,
    /// Resolution policy
    pub policy: TeamPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
}

impl TeamContactsConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the database URL is missing or an optional
    /// variable holds an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("TEAM_CONTACTS_DATABASE_URL")?;

        let backend = get_env_or_default("TEAM_CONTACTS_BACKEND", "unified")
            .parse()
            .map_err(|e| ConfigError::InvalidEnvVar("TEAM_CONTACTS_BACKEND".to_string(), e))?;

        let allow_edit_by_tenant_admins = match get_optional_env(
            "TEAM_CONTACTS_ALLOW_EDIT_BY_TENANT_ADMINS",
        ) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "TEAM_CONTACTS_ALLOW_EDIT_BY_TENANT_ADMINS".to_string(),
                    format!("expected a boolean, got `{raw}`"),
                )
            })?,
            None => false,
        };

        let book_uri = get_env_or_default("TEAM_CONTACTS_BOOK_URI", DEFAULT_BOOK_URI);
        if book_uri.is_empty() || book_uri.contains('/') {
            return Err(ConfigError::InvalidEnvVar(
                "TEAM_CONTACTS_BOOK_URI".to_string(),
                "must be a non-empty slug without `/`".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            backend,
            policy: TeamPolicy {
                allow_edit_by_tenant_admins,
                book_uri,
                book_display_name: get_env_or_default(
                    "TEAM_CONTACTS_BOOK_DISPLAY_NAME",
                    DEFAULT_BOOK_DISPLAY_NAME,
                ),
            },
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse the boolean spellings operators actually use in env files.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" YES "), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool(""), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("unified".parse::<BackendKind>().unwrap(), BackendKind::Unified);
        assert_eq!("Card_Store".parse::<BackendKind>().unwrap(), BackendKind::CardStore);
        assert!("mongo".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_default_policy_keeps_tenant_admin_override_off() {
        let policy = TeamPolicy::default();
        assert!(!policy.allow_edit_by_tenant_admins);
        assert_eq!(policy.book_uri, "gab");
        assert!(TeamPolicy::default().with_tenant_admin_edits(true).allow_edit_by_tenant_admins);
    }
}
