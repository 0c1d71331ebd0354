//! Query federator.
//!
//! Team rows join a personal contacts query as one more `OR` branch of the
//! predicate, before ordering and paging, so a single backend query yields
//! one ordering, one page window and one total.

use tracing::instrument;

use team_contacts_core::ContactScope;

use super::TeamContacts;
use crate::error::TeamContactsError;
use crate::identity::{IdentityOracle, SessionContext};
use crate::models::{ContactPage, ContactRecord, FederatedRow, SharedAddressBook};
use crate::query::{Column, ContactQuery, Predicate};
use crate::store::{SchemaShape, SharedContactStore};

/// Predicate selecting the team book's rows.
fn team_branch(shape: SchemaShape, book: &SharedAddressBook, query: &ContactQuery) -> Predicate {
    let in_book = Predicate::eq(Column::AddressBookId, book.id);
    let branch = match shape {
        SchemaShape::Unified => in_book.and(Predicate::eq(Column::TenantId, book.tenant_id)),
        SchemaShape::Split => in_book,
    };
    match &query.ids {
        Some(ids) => branch.and(Predicate::ids(ids)),
        None => branch,
    }
}

/// Extend `query` with the team book's rows.
fn federate(shape: SchemaShape, book: &SharedAddressBook, mut query: ContactQuery) -> ContactQuery {
    let branch = team_branch(shape, book, &query);
    query.predicate = query.predicate.or(branch);
    query.projection.shared_book = Some(book.id);
    query.projection.link_identity = shape == SchemaShape::Split;
    query
}

/// Replace the owner of split-schema team rows with the linked platform user.
///
/// Card rows carry no platform owner; the identity join supplies it.
#[must_use]
pub fn reconcile_identity(shape: SchemaShape, rows: Vec<FederatedRow>) -> Vec<ContactRecord> {
    rows.into_iter()
        .map(|row| {
            let mut record = row.record;
            if shape == SchemaShape::Split && row.is_shared {
                record.owner_user_id = record.linked_user_id;
            }
            record
        })
        .collect()
}

impl<S: SharedContactStore, I: IdentityOracle> TeamContacts<S, I> {
    /// Augment a personal contacts query for the requested scope.
    ///
    /// Scopes other than `team` and `all`, the system principal, and
    /// tenants without a team book leave the query unchanged.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn augment(
        &self,
        session: &SessionContext,
        base: ContactQuery,
        scope: ContactScope,
    ) -> Result<ContactQuery, TeamContactsError> {
        Ok(self.augment_with_book(session, base, scope).await?.0)
    }

    pub(super) async fn augment_with_book(
        &self,
        session: &SessionContext,
        base: ContactQuery,
        scope: ContactScope,
    ) -> Result<(ContactQuery, Option<SharedAddressBook>), TeamContactsError> {
        if !scope.includes_team() {
            return Ok((base, None));
        }
        let principal = session.principal();
        let Some(actor) = principal.user() else {
            return Ok((base, None));
        };
        let Some(book) = self.existing_book(actor.tenant_id).await? else {
            return Ok((base, None));
        };
        let query = federate(self.store().shape(), &book, base);
        Ok((query, Some(book)))
    }

    /// Run a federated list query and annotate the page for the acting user.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, session, base), fields(scope = %scope))]
    pub async fn list_contacts(
        &self,
        session: &SessionContext,
        base: ContactQuery,
        scope: ContactScope,
    ) -> Result<ContactPage, TeamContactsError> {
        let (query, book) = self.augment_with_book(session, base, scope).await?;
        self.run_federated(session, &query, book.as_ref()).await
    }

    /// Execute an already federated query.
    pub(super) async fn run_federated(
        &self,
        session: &SessionContext,
        query: &ContactQuery,
        book: Option<&SharedAddressBook>,
    ) -> Result<ContactPage, TeamContactsError> {
        let page = self.store().list_federated(query).await?;
        let mut contacts = reconcile_identity(self.store().shape(), page.rows);

        let principal = session.principal();
        if let (Some(actor), Some(book)) = (principal.user(), book) {
            for contact in &mut contacts {
                self.annotate_with(contact, actor, book);
            }
        }

        Ok(ContactPage {
            total: page.total,
            contacts,
        })
    }
}
