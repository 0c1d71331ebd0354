//! Address book listing, storage names and e-mail helpers.

use std::collections::BTreeMap;

use tracing::instrument;

use team_contacts_core::{AddressBookId, ContactScope, UserId};

use super::TeamContacts;
use crate::error::TeamContactsError;
use crate::identity::{IdentityOracle, SessionContext};
use crate::models::{AddressBookListing, ContactRecord};
use crate::query::{Column, ContactQuery, Predicate};
use crate::store::SharedContactStore;

/// Which team members a group e-mail expansion covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactGroup {
    /// Everyone in the acting user's team book.
    All,
    /// The listed platform users.
    Members(Vec<UserId>),
}

/// Whether a host storage argument names the team book.
///
/// Storage strings may carry a suffix (`team-7`); the first `-` part decides.
#[must_use]
pub fn is_team_storage(storage: &str) -> bool {
    storage.split('-').next() == Some(AddressBookListing::TEAM_ID)
}

impl<S: SharedContactStore, I: IdentityOracle> TeamContacts<S, I> {
    /// The team book as an entry of the acting user's address book list.
    ///
    /// Empty for the system principal.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, session))]
    pub async fn address_books(
        &self,
        session: &SessionContext,
    ) -> Result<Vec<AddressBookListing>, TeamContactsError> {
        let principal = session.principal();
        let Some(actor) = principal.user() else {
            return Ok(Vec::new());
        };
        let book = self.book_for_tenant(actor.tenant_id).await?;
        Ok(vec![book.listing()])
    }

    /// Resolve a storage argument to the team book id.
    ///
    /// Returns `None` when the storage is not the team book, or for the
    /// system principal.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn resolve_storage(
        &self,
        session: &SessionContext,
        storage: &str,
    ) -> Result<Option<AddressBookId>, TeamContactsError> {
        if !is_team_storage(storage) {
            return Ok(None);
        }
        let principal = session.principal();
        let Some(actor) = principal.user() else {
            return Ok(None);
        };
        Ok(Some(self.book_for_tenant(actor.tenant_id).await?.id))
    }

    /// Storage name to book uri map contributed to the host.
    #[must_use]
    pub fn storage_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([(AddressBookListing::TEAM_ID, self.policy().book_uri.clone())])
    }

    /// Team contacts matching `search` by name or e-mail, for autocomplete.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, session))]
    pub async fn contact_suggestions(
        &self,
        session: &SessionContext,
        search: &str,
        scope: ContactScope,
        limit: u32,
    ) -> Result<Vec<ContactRecord>, TeamContactsError> {
        if !scope.includes_team() {
            return Ok(Vec::new());
        }

        // No personal rows: the team branch is the only way in.
        let (query, book) = self
            .augment_with_book(session, ContactQuery::new(Predicate::False), ContactScope::Team)
            .await?;
        let mut query = query.page(0, limit);
        if !search.is_empty() {
            let matches = Predicate::Or(vec![
                Predicate::Contains(Column::DisplayName, search.to_string()),
                Predicate::Contains(Column::PrimaryEmail, search.to_string()),
            ]);
            query.predicate = Predicate::And(vec![query.predicate, matches]);
        }

        Ok(self.run_federated(session, &query, book.as_ref()).await?.contacts)
    }

    /// Address-list entries for a group of team members.
    ///
    /// `All` lists every team contact as `"Name"<email>` (or the bare
    /// e-mail). `Members` lists each visible member's public id, decorated
    /// with the name on their self contact when there is one.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn group_contact_emails(
        &self,
        session: &SessionContext,
        group: &ContactGroup,
    ) -> Result<Vec<String>, TeamContactsError> {
        let principal = session.principal();
        let Some(actor) = principal.user() else {
            return Ok(Vec::new());
        };
        let Some(book) = self.existing_book(actor.tenant_id).await? else {
            return Ok(Vec::new());
        };

        match group {
            ContactGroup::All => Ok(self
                .store()
                .list_book_contacts(book.id)
                .await?
                .iter()
                .map(ContactRecord::mailbox)
                .collect()),
            ContactGroup::Members(ids) => {
                let mut emails = Vec::with_capacity(ids.len());
                for id in ids {
                    let Some(member) = self.identity().user_by_id(*id).await? else {
                        continue;
                    };
                    if member.tenant_id != book.tenant_id {
                        continue;
                    }
                    let own = self
                        .store()
                        .find_contacts_by_email(book.id, &member.public_id)
                        .await?;
                    let entry = own.first().map_or_else(
                        || member.public_id.to_string(),
                        ContactRecord::mailbox,
                    );
                    emails.push(entry);
                }
                Ok(emails)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_storage_detection() {
        assert!(is_team_storage("team"));
        assert!(is_team_storage("team-12"));
        assert!(!is_team_storage("personal"));
        assert!(!is_team_storage("teams"));
        assert!(!is_team_storage(""));
    }
}
