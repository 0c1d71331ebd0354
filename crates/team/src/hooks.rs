//! Extension points the host platform calls into.
//!
//! [`ExtensionPoint`] is the table of every hook with the phase it must be
//! registered in. Each hook is a typed method on [`TeamContacts`]; nothing
//! here dispatches on names.
//!
//! Lifecycle hooks are best-effort: a failure is logged and sent to error
//! tracking but never fails the host's own operation, because an unsynced
//! user only loses team book membership until the next bootstrap scan.

use tracing::{error, warn};

use team_contacts_core::{Access, AddressBookId, ContactScope, Email, UserId};

use crate::error::TeamContactsError;
use crate::identity::{IdentityOracle, SessionContext};
use crate::models::{AddressBookListing, ContactRecord};
use crate::query::ContactQuery;
use crate::services::{
    AccessDecision, AccessTarget, BootstrapReport, DeletionSnapshot, SyncOutcome, TeamContacts,
};
use crate::store::SharedContactStore;

/// When a hook runs relative to the host operation it extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before the host acts; may veto or capture state.
    Before,
    /// After the host acted successfully.
    After,
}

/// Every extension point exposed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionPoint {
    UserCreated,
    BeforeUserDeleted,
    AfterUserDeleted,
    ListContacts,
    GetContact,
    GetContacts,
    CheckAccess,
    UpdateContact,
    GetAddressBooks,
    UpdateAddressBook,
    ServerBootstrap,
}

impl ExtensionPoint {
    /// All extension points, in registration order.
    pub const ALL: [Self; 11] = [
        Self::UserCreated,
        Self::BeforeUserDeleted,
        Self::AfterUserDeleted,
        Self::ListContacts,
        Self::GetContact,
        Self::GetContacts,
        Self::CheckAccess,
        Self::UpdateContact,
        Self::GetAddressBooks,
        Self::UpdateAddressBook,
        Self::ServerBootstrap,
    ];

    /// Stable name for the host's event registry.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UserCreated => "user.created",
            Self::BeforeUserDeleted => "user.deleting",
            Self::AfterUserDeleted => "user.deleted",
            Self::ListContacts => "contacts.list",
            Self::GetContact => "contacts.get",
            Self::GetContacts => "contacts.get_many",
            Self::CheckAccess => "contacts.check_access",
            Self::UpdateContact => "contacts.update",
            Self::GetAddressBooks => "address_books.list",
            Self::UpdateAddressBook => "address_books.update",
            Self::ServerBootstrap => "server.bootstrap",
        }
    }

    /// Phase the hook must be registered in.
    #[must_use]
    pub const fn phase(self) -> Phase {
        match self {
            Self::BeforeUserDeleted
            | Self::ListContacts
            | Self::CheckAccess
            | Self::UpdateContact
            | Self::UpdateAddressBook => Phase::Before,
            Self::UserCreated
            | Self::AfterUserDeleted
            | Self::GetContact
            | Self::GetContacts
            | Self::GetAddressBooks
            | Self::ServerBootstrap => Phase::After,
        }
    }
}

impl std::fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Log and report a lifecycle failure that must not fail the host.
fn report_lifecycle_failure(point: ExtensionPoint, user_id: UserId, err: &TeamContactsError) {
    let event_id = sentry::capture_error(err);
    error!(
        hook = %point,
        user_id = %user_id,
        error = %err,
        sentry_event_id = %event_id,
        "Team contacts lifecycle hook failed"
    );
}

impl<S: SharedContactStore, I: IdentityOracle> TeamContacts<S, I> {
    /// `user.created`: give the new user a self contact.
    ///
    /// `public_id` is the e-mail the host stored for the new user.
    /// Returns `None` if the sync failed; the failure has been logged.
    pub async fn on_user_created(
        &self,
        session: &SessionContext,
        user_id: UserId,
        public_id: &Email,
    ) -> Option<SyncOutcome> {
        match self
            .provision_created_user(session, user_id, public_id)
            .await
        {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                report_lifecycle_failure(ExtensionPoint::UserCreated, user_id, &e);
                None
            }
        }
    }

    /// `user.deleting`: snapshot the identity the after hook will match on.
    ///
    /// The snapshot must be handed to [`Self::after_user_deleted`] once the
    /// host has deleted the user.
    pub async fn before_user_deleted(
        &self,
        session: &SessionContext,
        user_id: UserId,
    ) -> Option<DeletionSnapshot> {
        match self.snapshot_user(session, user_id).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                report_lifecycle_failure(ExtensionPoint::BeforeUserDeleted, user_id, &e);
                None
            }
        }
    }

    /// `user.deleted`: remove the deleted user's self contact.
    ///
    /// Returns the number of contacts removed.
    pub async fn after_user_deleted(&self, snapshot: Option<DeletionSnapshot>) -> u64 {
        let Some(snapshot) = snapshot else {
            warn!("User deleted without a snapshot; team contact left for the next scan");
            return 0;
        };
        match self.remove_user_contact(&snapshot).await {
            Ok(removed) => removed,
            Err(e) => {
                report_lifecycle_failure(ExtensionPoint::AfterUserDeleted, snapshot.user_id, &e);
                0
            }
        }
    }

    /// `contacts.list`: add the team branch to a list query.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn on_list_contacts(
        &self,
        session: &SessionContext,
        scope: ContactScope,
        query: ContactQuery,
    ) -> Result<ContactQuery, TeamContactsError> {
        self.augment(session, query, scope).await
    }

    /// `contacts.get`: annotate one contact.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn on_get_contact(
        &self,
        session: &SessionContext,
        contact: ContactRecord,
    ) -> Result<ContactRecord, TeamContactsError> {
        self.annotate_contact(session, contact).await
    }

    /// `contacts.get_many`: annotate a list of contacts.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn on_get_contacts(
        &self,
        session: &SessionContext,
        contacts: Vec<ContactRecord>,
    ) -> Result<Vec<ContactRecord>, TeamContactsError> {
        self.annotate_contacts(session, contacts).await
    }

    /// `contacts.check_access`: decide a read or write.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn on_check_access(
        &self,
        session: &SessionContext,
        target: AccessTarget<'_>,
        access: Access,
    ) -> Result<Option<AccessDecision>, TeamContactsError> {
        self.check_access(session, target, access).await
    }

    /// `contacts.update`: gate and sanitize an update before the host stores it.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::AccessDenied` if the write is not allowed.
    /// Returns `TeamContactsError::NotFound` if the contact does not exist.
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn on_update_contact(
        &self,
        session: &SessionContext,
        contact: ContactRecord,
    ) -> Result<ContactRecord, TeamContactsError> {
        self.guard_update(session, contact).await
    }

    /// `address_books.list`: contribute the team book.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn on_get_address_books(
        &self,
        session: &SessionContext,
    ) -> Result<Vec<AddressBookListing>, TeamContactsError> {
        self.address_books(session).await
    }

    /// `address_books.update`: refuse changes to the team book itself.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::AccessDenied` if `book_id` is a team book.
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn on_update_address_book(
        &self,
        session: &SessionContext,
        book_id: AddressBookId,
    ) -> Result<(), TeamContactsError> {
        self.enforce(session, AccessTarget::Book(book_id), Access::Write)
            .await
    }

    /// `server.bootstrap`: run the self-healing scan for the session.
    pub async fn on_server_bootstrap(&self, session: &SessionContext) -> BootstrapReport {
        match self.bootstrap(session).await {
            Ok(report) => report,
            Err(e) => {
                let event_id = sentry::capture_error(&e);
                error!(
                    error = %e,
                    sentry_event_id = %event_id,
                    "Team contacts bootstrap failed"
                );
                BootstrapReport::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_extension_point_names_are_unique() {
        let names: HashSet<_> = ExtensionPoint::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), ExtensionPoint::ALL.len());
    }

    #[test]
    fn test_deletion_hooks_straddle_the_host_action() {
        assert_eq!(ExtensionPoint::BeforeUserDeleted.phase(), Phase::Before);
        assert_eq!(ExtensionPoint::AfterUserDeleted.phase(), Phase::After);
        assert_eq!(ExtensionPoint::UpdateAddressBook.phase(), Phase::Before);
    }
}
