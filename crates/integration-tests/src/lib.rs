//! Scenario tests for team contacts.
//!
//! Every scenario runs against both storage shapes through the in-memory
//! backends, so no database is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p team-contacts-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `access_rules` - Write gate, protected fields, tenant admin override
//! - `federation` - Federated listing, paging, id filters, suggestions
//! - `lifecycle` - Book provisioning, bootstrap scan, user deletion, hooks

#![allow(clippy::missing_panics_doc)]

use team_contacts::identity::{SessionContext, StaticDirectory};
use team_contacts::models::{ContactRecord, PlatformUser, SharedAddressBook};
use team_contacts::query::{Column, ContactQuery, Predicate};
use team_contacts::store::memory::NewContact;
use team_contacts::store::{MemoryContactStore, SchemaShape};
use team_contacts::{TeamContacts, TeamPolicy};
use team_contacts_core::{AddressBookId, Email, TenantId, UserId, UserRole};

/// Services over the in-memory backends.
pub type MemoryTeam = TeamContacts<MemoryContactStore, StaticDirectory>;

/// Both storage shapes, for tests that must hold on each.
pub const SHAPES: [SchemaShape; 2] = [SchemaShape::Unified, SchemaShape::Split];

/// Personal book ids start here so they never collide with team books.
const PERSONAL_BOOK_BASE: i32 = 10_000;

/// A platform user with a predictable public id.
#[must_use]
pub fn user(id: i32, tenant: i32, role: UserRole) -> PlatformUser {
    PlatformUser {
        id: UserId::new(id),
        tenant_id: TenantId::new(tenant),
        role,
        public_id: email(&format!("user{id}@tenant{tenant}.example.com")),
    }
}

/// Parse a fixture e-mail.
#[must_use]
pub fn email(raw: &str) -> Email {
    Email::parse(raw).expect("fixture e-mail is valid")
}

/// Services over a fresh store of `shape` and a directory of `users`.
#[must_use]
pub fn team(shape: SchemaShape, policy: TeamPolicy, users: &[PlatformUser]) -> MemoryTeam {
    team_over(MemoryContactStore::new(shape), policy, users)
}

/// Services over a prepared store.
#[must_use]
pub fn team_over(store: MemoryContactStore, policy: TeamPolicy, users: &[PlatformUser]) -> MemoryTeam {
    TeamContacts::new(store, StaticDirectory::with_users(users.iter().cloned()), policy)
}

/// Session acting as `user`.
#[must_use]
pub fn session(user: &PlatformUser) -> SessionContext {
    SessionContext::for_user(user.clone())
}

/// Id of `user`'s personal address book.
#[must_use]
pub const fn personal_book(user: &PlatformUser) -> AddressBookId {
    AddressBookId::new(PERSONAL_BOOK_BASE + user.id.as_i32())
}

/// Store a personal contact owned by `owner`.
pub fn add_personal(team: &MemoryTeam, owner: &PlatformUser, address: &str, name: &str) -> ContactRecord {
    team.store().insert_contact(NewContact {
        owner_user_id: Some(owner.id),
        tenant_id: owner.tenant_id,
        address_book_id: personal_book(owner),
        primary_email: email(address),
        display_name: name.to_string(),
    })
}

/// The host's base query for `user`'s personal contacts.
#[must_use]
pub fn personal_query(user: &PlatformUser) -> ContactQuery {
    ContactQuery::new(
        Predicate::eq(Column::OwnerUserId, user.id)
            .and(Predicate::eq(Column::AddressBookId, personal_book(user))),
    )
}

/// Run the system bootstrap scan and return `tenant`'s team book.
pub async fn bootstrap(team: &MemoryTeam, tenant: i32) -> SharedAddressBook {
    let report = team.on_server_bootstrap(&SessionContext::system()).await;
    assert_eq!(report.failed, 0, "bootstrap failed: {report:?}");
    team.existing_book(TenantId::new(tenant))
        .await
        .expect("store is available")
        .expect("bootstrap provisions the team book")
}

/// Stored contacts of `book`, ordered by id.
#[must_use]
pub fn book_contacts(team: &MemoryTeam, book: &SharedAddressBook) -> Vec<ContactRecord> {
    let mut contacts: Vec<_> = team
        .store()
        .contacts()
        .into_iter()
        .filter(|c| c.address_book_id == book.id)
        .collect();
    contacts.sort_by_key(|c| c.id);
    contacts
}

/// The stored contact whose primary e-mail is `user`'s public id.
#[must_use]
pub fn self_contact(team: &MemoryTeam, book: &SharedAddressBook, user: &PlatformUser) -> ContactRecord {
    book_contacts(team, book)
        .into_iter()
        .find(|c| c.primary_email == user.public_id)
        .expect("user has a self contact")
}
