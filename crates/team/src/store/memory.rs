//! In-memory contacts backend.
//!
//! Emulates both storage shapes closely enough to exercise federation,
//! provisioning races and lifecycle sync without a database. Every call
//! yields to the scheduler first, so concurrent callers interleave the way
//! they would against a real store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use team_contacts_core::{AddressBookId, ContactId, Email, TenantId, UserId};

use super::{SchemaShape, SharedContactStore};
use crate::db::RepositoryError;
use crate::models::{
    BookPrincipal, ContactRecord, ExtendedInfo, FederatedPage, FederatedRow, NewSharedBook,
    PlatformUser, SharedAddressBook,
};
use crate::query::ContactQuery;

const CLOCK_ORIGIN_MILLIS: i64 = 1_700_000_000_000;

/// Fields of a contact inserted directly, bypassing the team book logic.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub owner_user_id: Option<UserId>,
    pub tenant_id: TenantId,
    pub address_book_id: AddressBookId,
    pub primary_email: Email,
    pub display_name: String,
}

#[derive(Debug, Default)]
struct State {
    clock: i64,
    next_book_id: i32,
    next_contact_id: i32,
    books: Vec<SharedAddressBook>,
    contacts: Vec<ContactRecord>,
    identities: HashMap<Email, UserId>,
}

impl State {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        DateTime::from_timestamp_millis(CLOCK_ORIGIN_MILLIS + self.clock).unwrap_or_default()
    }

    fn bump_book(&mut self, id: AddressBookId) {
        if let Some(book) = self.books.iter_mut().find(|b| b.id == id) {
            book.change_token += 1;
        }
    }

    fn push_contact(&mut self, new: NewContact) -> ContactRecord {
        self.next_contact_id += 1;
        let created_at = self.tick();
        let record = ContactRecord {
            id: ContactId::new(self.next_contact_id),
            owner_user_id: new.owner_user_id,
            tenant_id: new.tenant_id,
            address_book_id: new.address_book_id,
            primary_email: new.primary_email,
            display_name: new.display_name,
            extended_info: ExtendedInfo::default(),
            linked_user_id: None,
            created_at,
        };
        self.contacts.push(record.clone());
        self.bump_book(record.address_book_id);
        record
    }
}

/// A contacts backend held in memory.
#[derive(Debug)]
pub struct MemoryContactStore {
    shape: SchemaShape,
    unique_books: bool,
    unavailable: AtomicBool,
    state: Mutex<State>,
}

impl MemoryContactStore {
    /// Empty store of the given shape, with a uniqueness constraint on
    /// `(principal, uri)` for books.
    #[must_use]
    pub fn new(shape: SchemaShape) -> Self {
        Self {
            shape,
            unique_books: true,
            unavailable: AtomicBool::new(false),
            state: Mutex::new(State::default()),
        }
    }

    /// Empty unified-schema store.
    #[must_use]
    pub fn unified() -> Self {
        Self::new(SchemaShape::Unified)
    }

    /// Empty split-schema store.
    #[must_use]
    pub fn split() -> Self {
        Self::new(SchemaShape::Split)
    }

    /// Drop the book uniqueness constraint, so `create_book` always inserts.
    #[must_use]
    pub const fn without_book_uniqueness(mut self) -> Self {
        self.unique_books = false;
        self
    }

    /// Make every subsequent write fail with `RepositoryError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Register a platform identity for the split-schema e-mail join.
    pub fn link_identity(&self, email: Email, user_id: UserId) {
        self.lock().identities.insert(email, user_id);
    }

    /// Insert a contact directly, as the host's generic CRUD path would.
    pub fn insert_contact(&self, new: NewContact) -> ContactRecord {
        self.lock().push_contact(new)
    }

    /// Insert a book unconditionally, e.g. to seed a duplicate.
    pub fn insert_book(&self, new: &NewSharedBook) -> SharedAddressBook {
        let mut state = self.lock();
        push_book(&mut state, new)
    }

    /// Snapshot of every stored contact.
    #[must_use]
    pub fn contacts(&self) -> Vec<ContactRecord> {
        self.lock().contacts.clone()
    }

    /// Snapshot of every stored book.
    #[must_use]
    pub fn books(&self) -> Vec<SharedAddressBook> {
        self.lock().books.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "memory store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

fn push_book(state: &mut State, new: &NewSharedBook) -> SharedAddressBook {
    state.next_book_id += 1;
    let created_at = state.tick();
    let book = SharedAddressBook {
        id: AddressBookId::new(state.next_book_id),
        tenant_id: new.principal.tenant_id(),
        display_name: new.display_name.clone(),
        change_token: 1,
        uri: new.uri.clone(),
        principal_uri: new.principal.uri(),
        created_at,
    };
    state.books.push(book.clone());
    book
}

fn earliest_first(a: &ContactRecord, b: &ContactRecord) -> std::cmp::Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

impl SharedContactStore for MemoryContactStore {
    fn shape(&self) -> SchemaShape {
        self.shape
    }

    async fn find_books(
        &self,
        principal: BookPrincipal,
        uri: &str,
    ) -> Result<Vec<SharedAddressBook>, RepositoryError> {
        tokio::task::yield_now().await;
        let principal_uri = principal.uri();
        let mut books: Vec<_> = self
            .lock()
            .books
            .iter()
            .filter(|b| b.principal_uri == principal_uri && b.uri == uri)
            .cloned()
            .collect();
        books.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(books)
    }

    async fn create_book(&self, book: &NewSharedBook) -> Result<bool, RepositoryError> {
        tokio::task::yield_now().await;
        self.check_writable()?;
        let mut state = self.lock();
        let principal_uri = book.principal.uri();
        if self.unique_books
            && state
                .books
                .iter()
                .any(|b| b.principal_uri == principal_uri && b.uri == book.uri)
        {
            return Ok(false);
        }
        push_book(&mut state, book);
        Ok(true)
    }

    async fn get_book(&self, id: AddressBookId) -> Result<Option<SharedAddressBook>, RepositoryError> {
        tokio::task::yield_now().await;
        Ok(self.lock().books.iter().find(|b| b.id == id).cloned())
    }

    async fn get_contact(&self, id: ContactId) -> Result<Option<ContactRecord>, RepositoryError> {
        tokio::task::yield_now().await;
        Ok(self.lock().contacts.iter().find(|c| c.id == id).cloned())
    }

    async fn find_contacts_by_email(
        &self,
        book: AddressBookId,
        email: &Email,
    ) -> Result<Vec<ContactRecord>, RepositoryError> {
        tokio::task::yield_now().await;
        let mut found: Vec<_> = self
            .lock()
            .contacts
            .iter()
            .filter(|c| c.address_book_id == book && c.primary_email == *email)
            .cloned()
            .collect();
        found.sort_by(earliest_first);
        Ok(found)
    }

    async fn list_book_contacts(&self, book: AddressBookId) -> Result<Vec<ContactRecord>, RepositoryError> {
        tokio::task::yield_now().await;
        let mut found: Vec<_> = self
            .lock()
            .contacts
            .iter()
            .filter(|c| c.address_book_id == book)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.display_name.cmp(&b.display_name).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn list_federated(&self, query: &ContactQuery) -> Result<FederatedPage, RepositoryError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        let mut matching: Vec<&ContactRecord> = state
            .contacts
            .iter()
            .filter(|c| query.predicate.matches(c))
            .collect();
        matching.sort_by(|a, b| query.compare(a, b));

        let total = matching.len() as u64;
        let window = matching.into_iter().skip(query.offset as usize);
        let window: Vec<&ContactRecord> = match query.limit {
            Some(limit) => window.take(limit as usize).collect(),
            None => window.collect(),
        };

        let rows = window
            .into_iter()
            .map(|record| {
                let mut record = record.clone();
                if query.projection.link_identity {
                    record.linked_user_id = state.identities.get(&record.primary_email).copied();
                }
                FederatedRow {
                    is_shared: query.projection.shared_book == Some(record.address_book_id),
                    record,
                }
            })
            .collect();

        Ok(FederatedPage { total, rows })
    }

    async fn create_self_contact(
        &self,
        book: &SharedAddressBook,
        user: &PlatformUser,
    ) -> Result<Option<ContactRecord>, RepositoryError> {
        tokio::task::yield_now().await;
        self.check_writable()?;
        let mut state = self.lock();
        if state
            .contacts
            .iter()
            .any(|c| c.address_book_id == book.id && c.primary_email == user.public_id)
        {
            return Ok(None);
        }

        // The card store has no notion of a platform owner; the identity
        // is recovered through the e-mail join at query time.
        let owner_user_id = match self.shape {
            SchemaShape::Unified => Some(user.id),
            SchemaShape::Split => {
                state.identities.insert(user.public_id.clone(), user.id);
                None
            }
        };
        let record = state.push_contact(NewContact {
            owner_user_id,
            tenant_id: book.tenant_id,
            address_book_id: book.id,
            primary_email: user.public_id.clone(),
            display_name: String::new(),
        });
        Ok(Some(record))
    }

    async fn update_contact(&self, contact: &ContactRecord) -> Result<ContactRecord, RepositoryError> {
        tokio::task::yield_now().await;
        self.check_writable()?;
        let mut state = self.lock();
        let stored = state
            .contacts
            .iter_mut()
            .find(|c| c.id == contact.id)
            .ok_or(RepositoryError::NotFound)?;
        stored.primary_email = contact.primary_email.clone();
        stored.display_name = contact.display_name.clone();
        stored.extended_info = contact.extended_info.clone();
        let updated = stored.clone();
        state.bump_book(updated.address_book_id);
        Ok(updated)
    }

    async fn remove_contact(&self, book: AddressBookId, id: ContactId) -> Result<bool, RepositoryError> {
        tokio::task::yield_now().await;
        self.check_writable()?;
        let mut state = self.lock();
        let before = state.contacts.len();
        state.contacts.retain(|c| !(c.address_book_id == book && c.id == id));
        let removed = state.contacts.len() < before;
        if removed {
            state.bump_book(book);
        }
        Ok(removed)
    }

    async fn remove_self_contact(&self, book: AddressBookId, email: &Email) -> Result<u64, RepositoryError> {
        tokio::task::yield_now().await;
        self.check_writable()?;
        let mut state = self.lock();
        let before = state.contacts.len();
        state
            .contacts
            .retain(|c| !(c.address_book_id == book && c.primary_email == *email));
        let removed = (before - state.contacts.len()) as u64;
        if removed > 0 {
            state.bump_book(book);
        }
        Ok(removed)
    }
}
