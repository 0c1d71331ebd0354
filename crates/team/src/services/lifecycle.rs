//! Lifecycle synchronizer.
//!
//! Keeps exactly one self contact per platform user in the tenant's team
//! book: created when the user is created, backfilled by the bootstrap
//! scan, removed when the user is deleted.
//!
//! Self contact creation is check-then-insert inside one backend call. A
//! backend without a transactional check may still race two creators into
//! a duplicate; the bootstrap scan prunes such duplicates, keeping the
//! earliest record.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use team_contacts_core::{Email, TenantId, UserId, UserRole};

use super::TeamContacts;
use crate::error::TeamContactsError;
use crate::identity::{IdentityOracle, SessionContext};
use crate::models::{ContactRecord, PlatformUser, Principal, SharedAddressBook};
use crate::store::SharedContactStore;

/// Result of ensuring one user's self contact.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// A self contact was created.
    Created(ContactRecord),
    /// The user already had a self contact; `pruned` duplicates were removed.
    AlreadyPresent { pruned: u64 },
}

/// Totals of a bootstrap scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// Users in scope.
    pub scanned: usize,
    /// Self contacts created.
    pub created: usize,
    /// Users that already had a self contact.
    pub already_present: usize,
    /// Duplicate self contacts removed.
    pub duplicates_pruned: u64,
    /// Users whose sync failed; see the logs.
    pub failed: usize,
}

impl BootstrapReport {
    /// Count one user's successful sync.
    pub const fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Created(_) => self.created += 1,
            SyncOutcome::AlreadyPresent { pruned } => {
                self.already_present += 1;
                self.duplicates_pruned += *pruned;
            }
        }
    }

    fn log_summary(&self) {
        info!(
            scanned = self.scanned,
            created = self.created,
            pruned = self.duplicates_pruned,
            failed = self.failed,
            "Team contacts bootstrap complete"
        );
    }
}

/// Identity captured before a user is deleted.
///
/// Produced by [`TeamContacts::snapshot_user`] before the host deletes the
/// user and consumed by [`TeamContacts::remove_user_contact`] afterwards.
/// The after step never looks the user up again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionSnapshot {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub public_id: Email,
    /// The tenant's team book at snapshot time, if provisioned.
    pub book: Option<SharedAddressBook>,
}

impl<S: SharedContactStore, I: IdentityOracle> TeamContacts<S, I> {
    /// Ensure `user` has exactly one self contact in `book`.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn ensure_self_contact(
        &self,
        book: &SharedAddressBook,
        user: &PlatformUser,
    ) -> Result<SyncOutcome, TeamContactsError> {
        let existing = self
            .store()
            .find_contacts_by_email(book.id, &user.public_id)
            .await?;
        if !existing.is_empty() {
            let pruned = self.prune_duplicates(book, existing).await?;
            return Ok(SyncOutcome::AlreadyPresent { pruned });
        }

        match self.store().create_self_contact(book, user).await? {
            Some(contact) => {
                info!(
                    user_id = %user.id,
                    contact_id = %contact.id,
                    book_id = %book.id,
                    "Created team self contact"
                );
                Ok(SyncOutcome::Created(contact))
            }
            None => Ok(SyncOutcome::AlreadyPresent { pruned: 0 }),
        }
    }

    /// Remove all but the earliest of a user's self contacts.
    async fn prune_duplicates(
        &self,
        book: &SharedAddressBook,
        mut contacts: Vec<ContactRecord>,
    ) -> Result<u64, TeamContactsError> {
        if contacts.len() < 2 {
            return Ok(0);
        }
        contacts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let mut pruned = 0;
        for duplicate in contacts.iter().skip(1) {
            if self
                .store()
                .remove_contact(book.id, duplicate.id)
                .await?
            {
                pruned += 1;
            }
        }
        warn!(
            book_id = %book.id,
            email = %contacts.first().map_or("", |c| c.primary_email.as_str()),
            pruned,
            "Provisioning race: pruned duplicate self contacts"
        );
        Ok(pruned)
    }

    /// Create the self contact of an existing user.
    ///
    /// The lookup and creation run under an elevated context that ends
    /// when this call returns; `session` itself is never changed.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::NotFound` if the user does not exist.
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, session), fields(user_id = %user_id))]
    pub async fn provision_user(
        &self,
        session: &SessionContext,
        user_id: UserId,
    ) -> Result<SyncOutcome, TeamContactsError> {
        self.provision(session, user_id, None).await
    }

    /// Create the self contact of a user the host has just created.
    ///
    /// `public_id` is the e-mail the host stored for the user. The self
    /// contact is only created when the directory reports the same e-mail.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::NotFound` if the user does not exist or
    /// the directory holds a different e-mail for it.
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, session), fields(user_id = %user_id, email = %public_id))]
    pub async fn provision_created_user(
        &self,
        session: &SessionContext,
        user_id: UserId,
        public_id: &Email,
    ) -> Result<SyncOutcome, TeamContactsError> {
        self.provision(session, user_id, Some(public_id)).await
    }

    async fn provision(
        &self,
        session: &SessionContext,
        user_id: UserId,
        expected: Option<&Email>,
    ) -> Result<SyncOutcome, TeamContactsError> {
        let elevated = session.elevated();
        let user = self.visible_user(&elevated, user_id).await?;
        if let Some(expected) = expected
            && *expected != user.public_id
        {
            return Err(TeamContactsError::not_found(format!(
                "user {user_id} with e-mail {expected}"
            )));
        }
        let book = self.book_for_tenant(user.tenant_id).await?;
        self.ensure_self_contact(&book, &user).await
    }

    /// Capture what the after-deletion step needs, before the user goes.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::NotFound` if the user does not exist.
    /// Returns `TeamContactsError::AccessDenied` if the acting principal
    /// cannot see the user's tenant.
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, session), fields(user_id = %user_id))]
    pub async fn snapshot_user(
        &self,
        session: &SessionContext,
        user_id: UserId,
    ) -> Result<DeletionSnapshot, TeamContactsError> {
        let user = self.visible_user(session, user_id).await?;
        let book = self.existing_book(user.tenant_id).await?;
        Ok(DeletionSnapshot {
            user_id: user.id,
            tenant_id: user.tenant_id,
            public_id: user.public_id,
            book,
        })
    }

    /// Remove the deleted user's self contacts, matched by the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, snapshot), fields(user_id = %snapshot.user_id))]
    pub async fn remove_user_contact(
        &self,
        snapshot: &DeletionSnapshot,
    ) -> Result<u64, TeamContactsError> {
        let Some(book) = &snapshot.book else {
            return Ok(0);
        };
        let removed = self
            .store()
            .remove_self_contact(book.id, &snapshot.public_id)
            .await?;
        info!(removed, book_id = %book.id, "Removed team self contact of deleted user");
        Ok(removed)
    }

    /// Users a bootstrap scan covers for the acting principal.
    async fn users_in_scope(
        &self,
        session: &SessionContext,
    ) -> Result<Vec<PlatformUser>, TeamContactsError> {
        let users = match session.principal() {
            Principal::System => self.identity().all_users().await?,
            Principal::User(user) => match user.role {
                UserRole::SuperAdmin => self.identity().all_users().await?,
                UserRole::TenantAdmin => self.identity().users_in_tenant(user.tenant_id).await?,
                UserRole::NormalUser => vec![user],
            },
        };
        Ok(users)
    }

    /// Backfill self contacts for every user in the acting principal's scope.
    ///
    /// A normal user covers themselves, a tenant admin their tenant, a
    /// super admin or the system principal every tenant. Per-user failures
    /// are logged and counted; the scan carries on.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the user list
    /// cannot be read.
    #[instrument(skip(self, session))]
    pub async fn bootstrap(&self, session: &SessionContext) -> Result<BootstrapReport, TeamContactsError> {
        let users = self.users_in_scope(session).await?;

        let mut by_tenant: BTreeMap<TenantId, Vec<PlatformUser>> = BTreeMap::new();
        for user in users {
            by_tenant.entry(user.tenant_id).or_default().push(user);
        }

        let mut report = BootstrapReport::default();
        for (tenant_id, users) in by_tenant {
            self.sync_tenant(tenant_id, &users, &mut report).await;
        }

        report.log_summary();
        Ok(report)
    }

    /// Backfill self contacts for every user of one tenant.
    ///
    /// Used by operators; the caller is trusted, so no session is involved.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the user list
    /// cannot be read.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn bootstrap_tenant(
        &self,
        tenant_id: TenantId,
    ) -> Result<BootstrapReport, TeamContactsError> {
        let users = self.identity().users_in_tenant(tenant_id).await?;
        let mut report = BootstrapReport::default();
        self.sync_tenant(tenant_id, &users, &mut report).await;
        report.log_summary();
        Ok(report)
    }

    /// Ensure the self contacts of `users`, all members of `tenant_id`.
    async fn sync_tenant(
        &self,
        tenant_id: TenantId,
        users: &[PlatformUser],
        report: &mut BootstrapReport,
    ) {
        report.scanned += users.len();
        let book = match self.book_for_tenant(tenant_id).await {
            Ok(book) => book,
            Err(e) => {
                error!(tenant_id = %tenant_id, error = %e, "Team book unavailable during bootstrap");
                report.failed += users.len();
                return;
            }
        };

        for user in users {
            match self.ensure_self_contact(&book, user).await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    error!(user_id = %user.id, error = %e, "Self contact backfill failed");
                    report.failed += 1;
                }
            }
        }
    }
}
