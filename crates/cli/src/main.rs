//! Team Contacts CLI - Database migrations and backfill tools.
//!
//! # Usage
//!
//! ```bash
//! # Create or upgrade the team contacts schema
//! tc-cli migrate
//!
//! # Give every platform user a team self contact
//! tc-cli sync
//!
//! # Only one tenant, or only one user
//! tc-cli sync --tenant 7
//! tc-cli sync --user 42
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `sync` - Run the self contact backfill scan
//!
//! Set `LOG_FORMAT=json` for machine-readable logs.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use team_contacts::TeamContactsConfig;
use team_contacts_core::{TenantId, UserId};

mod commands;

#[derive(Parser)]
#[command(name = "tc-cli")]
#[command(author, version, about = "Team contacts CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Backfill team self contacts for existing users
    Sync {
        /// Only users of this tenant
        #[arg(short, long, conflicts_with = "user")]
        tenant: Option<TenantId>,

        /// Only this user
        #[arg(short, long)]
        user: Option<UserId>,
    },
}

/// Initialize Sentry error tracking when a DSN is configured.
fn init_sentry(config: &TeamContactsConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "team_contacts=info,team_contacts_cli=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match TeamContactsConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &TeamContactsConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run(config).await?,
        Commands::Sync { tenant, user } => {
            let scope = match (tenant, user) {
                (_, Some(user)) => commands::sync::SyncScope::User(user),
                (Some(tenant), None) => commands::sync::SyncScope::Tenant(tenant),
                (None, None) => commands::sync::SyncScope::All,
            };
            commands::sync::run(config, scope).await?;
        }
    }
    Ok(())
}
