//! Shared-book locator.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use team_contacts_core::{TenantId, UserId};

use super::TeamContacts;
use crate::error::TeamContactsError;
use crate::identity::{IdentityOracle, SessionContext};
use crate::models::{BookPrincipal, NewSharedBook, PlatformUser, SharedAddressBook};
use crate::store::SharedContactStore;

/// Pick the earliest-created book, warning when there is more than one.
pub(super) fn earliest_book(
    tenant_id: TenantId,
    books: Vec<SharedAddressBook>,
) -> Option<SharedAddressBook> {
    if books.len() > 1 {
        let ids: Vec<String> = books.iter().map(|b| b.id.to_string()).collect();
        warn!(
            tenant_id = %tenant_id,
            book_ids = %ids.join(","),
            "Provisioning race: duplicate team books, using the earliest"
        );
    }
    books
        .into_iter()
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
}

impl<S: SharedContactStore, I: IdentityOracle> TeamContacts<S, I> {
    /// Find or provision the team book of `user_id`'s tenant.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::NotFound` if the user does not exist.
    /// Returns `TeamContactsError::AccessDenied` if the acting principal
    /// cannot see the user's tenant.
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, session), fields(user_id = %user_id))]
    pub async fn locate(
        &self,
        session: &SessionContext,
        user_id: UserId,
    ) -> Result<SharedAddressBook, TeamContactsError> {
        let user = self.visible_user(session, user_id).await?;
        self.book_for_tenant(user.tenant_id).await
    }

    /// Look up a user and check the acting principal may see its tenant.
    pub(super) async fn visible_user(
        &self,
        session: &SessionContext,
        user_id: UserId,
    ) -> Result<PlatformUser, TeamContactsError> {
        let user = self
            .identity()
            .user_by_id(user_id)
            .await?
            .ok_or_else(|| TeamContactsError::not_found(format!("user {user_id}")))?;

        if !self.identity().can_view(&session.principal(), &user) {
            return Err(TeamContactsError::denied(format!(
                "tenant {} is not visible to the acting user",
                user.tenant_id
            )));
        }
        Ok(user)
    }

    /// The tenant's team book if it has been provisioned.
    ///
    /// Read paths use this so that listing contacts never writes.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn existing_book(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<SharedAddressBook>, TeamContactsError> {
        let books = self
            .store()
            .find_books(BookPrincipal::for_tenant(tenant_id), &self.policy().book_uri)
            .await?;
        Ok(earliest_book(tenant_id, books))
    }

    /// Find the tenant's team book, provisioning it on first use.
    ///
    /// Creation is serialized per tenant in this process, conditional in
    /// the backend, and always followed by a re-read, so concurrent
    /// callers converge on one book.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    /// Returns `TeamContactsError::ProvisioningRace` if the book cannot be
    /// read back after creation.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn book_for_tenant(
        &self,
        tenant_id: TenantId,
    ) -> Result<SharedAddressBook, TeamContactsError> {
        if let Some(book) = self.existing_book(tenant_id).await? {
            return Ok(book);
        }

        let lock = self
            .inner
            .creation_locks
            .get_with(tenant_id, async { Arc::new(Mutex::new(())) })
            .await;
        let _creating = lock.lock_owned().await;

        // Another caller may have finished while we waited.
        if let Some(book) = self.existing_book(tenant_id).await? {
            return Ok(book);
        }

        let created = self
            .store()
            .create_book(&NewSharedBook {
                principal: BookPrincipal::for_tenant(tenant_id),
                uri: self.policy().book_uri.clone(),
                display_name: self.policy().book_display_name.clone(),
            })
            .await?;
        if created {
            info!("Provisioned team book");
        } else {
            debug!("Team book was created by another process");
        }

        self.existing_book(tenant_id).await?.ok_or_else(|| {
            TeamContactsError::ProvisioningRace(format!(
                "team book for tenant {tenant_id} missing after creation"
            ))
        })
    }
}
