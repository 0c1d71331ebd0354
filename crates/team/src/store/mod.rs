//! Storage seam for team books and their contacts.
//!
//! The team book has lived in two storage shapes:
//!
//! - **Unified**: team and personal contacts share one table, told apart by
//!   the address book column. Federation is one extra `OR` branch scoped to
//!   the tenant.
//! - **Split**: team contacts live in a card store and reach the contacts
//!   relation through a bridge table. Federation needs a join, a derived
//!   `is_shared` column and an identity substitution after the query.
//!
//! Services depend only on [`SharedContactStore`]. Implementations:
//! [`crate::db::PgUnifiedStore`], [`crate::db::PgCardStore`] and the
//! in-memory [`MemoryContactStore`] which emulates either shape.

pub mod memory;

use std::future::Future;

use team_contacts_core::{AddressBookId, ContactId, Email};

use crate::db::RepositoryError;
use crate::models::{
    BookPrincipal, ContactRecord, FederatedPage, NewSharedBook, PlatformUser, SharedAddressBook,
};
use crate::query::ContactQuery;

pub use memory::MemoryContactStore;

/// Physical layout of the store holding the team book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaShape {
    /// One contacts table for team and personal rows.
    Unified,
    /// Card store plus bridge table.
    Split,
}

/// Everything the resolution services need from a contacts backend.
///
/// All methods are plain data access. Policy (who may see or change what)
/// stays in [`crate::services`].
pub trait SharedContactStore: Send + Sync {
    /// Storage shape, which decides how queries are federated.
    fn shape(&self) -> SchemaShape;

    /// Every book registered under `principal` with slug `uri`, earliest
    /// first. More than one means a provisioning race slipped through.
    fn find_books(
        &self,
        principal: BookPrincipal,
        uri: &str,
    ) -> impl Future<Output = Result<Vec<SharedAddressBook>, RepositoryError>> + Send;

    /// Conditionally create a book. Returns `false` when the backend
    /// reports it already exists.
    fn create_book(
        &self,
        book: &NewSharedBook,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Look up a book by its backend key.
    fn get_book(
        &self,
        id: AddressBookId,
    ) -> impl Future<Output = Result<Option<SharedAddressBook>, RepositoryError>> + Send;

    /// Look up a contact by its native key.
    fn get_contact(
        &self,
        id: ContactId,
    ) -> impl Future<Output = Result<Option<ContactRecord>, RepositoryError>> + Send;

    /// Contacts of `book` whose primary e-mail is `email`, earliest first.
    fn find_contacts_by_email(
        &self,
        book: AddressBookId,
        email: &Email,
    ) -> impl Future<Output = Result<Vec<ContactRecord>, RepositoryError>> + Send;

    /// Every contact of `book`, ordered by display name.
    fn list_book_contacts(
        &self,
        book: AddressBookId,
    ) -> impl Future<Output = Result<Vec<ContactRecord>, RepositoryError>> + Send;

    /// Run a (possibly federated) list query: filter, then order, then page.
    fn list_federated(
        &self,
        query: &ContactQuery,
    ) -> impl Future<Output = Result<FederatedPage, RepositoryError>> + Send;

    /// Create `user`'s self contact in `book` unless one with the same
    /// e-mail already exists. Returns `None` when nothing was created.
    fn create_self_contact(
        &self,
        book: &SharedAddressBook,
        user: &PlatformUser,
    ) -> impl Future<Output = Result<Option<ContactRecord>, RepositoryError>> + Send;

    /// Persist a contact's mutable fields and bump its book's change token.
    fn update_contact(
        &self,
        contact: &ContactRecord,
    ) -> impl Future<Output = Result<ContactRecord, RepositoryError>> + Send;

    /// Delete one contact of `book`. Returns whether it existed.
    fn remove_contact(
        &self,
        book: AddressBookId,
        id: ContactId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete every contact of `book` with primary e-mail `email`.
    /// Returns how many were removed.
    fn remove_self_contact(
        &self,
        book: AddressBookId,
        email: &Email,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}
