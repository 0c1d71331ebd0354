//! Team contacts resolution services.
//!
//! # Services
//!
//! - `locator` - Find or lazily provision a tenant's team book
//! - `visibility` - Per-contact `IsSelf` / `ReadOnly` annotations
//! - `access` - Write gate for team contacts and the team book
//! - `federation` - Merge team rows into personal contact queries
//! - `lifecycle` - Keep one self contact per user in the team book
//! - `directory` - Address book listing, storage resolution, suggestions
//!
//! Every service is a method on [`TeamContacts`], which is cheap to clone
//! and generic over the contacts backend and the identity oracle.

mod access;
mod directory;
mod federation;
mod lifecycle;
mod locator;
mod visibility;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;

use team_contacts_core::TenantId;

use crate::config::TeamPolicy;
use crate::identity::IdentityOracle;
use crate::store::SharedContactStore;

pub use access::{AccessDecision, AccessTarget};
pub use directory::{ContactGroup, is_team_storage};
pub use federation::reconcile_identity;
pub use lifecycle::{BootstrapReport, DeletionSnapshot, SyncOutcome};
pub use visibility::{Visibility, resolve_visibility};

/// Tenants whose creation lock stays resident at once.
const CREATION_LOCK_CAPACITY: u64 = 10_000;
/// Idle time after which a tenant's creation lock is dropped.
const CREATION_LOCK_IDLE: Duration = Duration::from_secs(600);

/// Entry point for every team contacts operation.
pub struct TeamContacts<S, I> {
    inner: Arc<TeamContactsInner<S, I>>,
}

struct TeamContactsInner<S, I> {
    store: S,
    identity: I,
    policy: TeamPolicy,
    /// Serializes team book creation per tenant within this process.
    creation_locks: Cache<TenantId, Arc<Mutex<()>>>,
}

impl<S, I> Clone for TeamContacts<S, I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SharedContactStore, I: IdentityOracle> TeamContacts<S, I> {
    /// Create the services over a backend and an identity oracle.
    #[must_use]
    pub fn new(store: S, identity: I, policy: TeamPolicy) -> Self {
        let creation_locks = Cache::builder()
            .max_capacity(CREATION_LOCK_CAPACITY)
            .time_to_idle(CREATION_LOCK_IDLE)
            .build();

        Self {
            inner: Arc::new(TeamContactsInner {
                store,
                identity,
                policy,
                creation_locks,
            }),
        }
    }

    /// The contacts backend.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// The identity oracle.
    #[must_use]
    pub fn identity(&self) -> &I {
        &self.inner.identity
    }

    /// The resolution policy.
    #[must_use]
    pub fn policy(&self) -> &TeamPolicy {
        &self.inner.policy
    }
}
