//! Domain models for team contacts.
//!
//! These are validated domain objects; the database row types live next to
//! the queries in [`crate::db`] and convert into these with `TryFrom`.

pub mod address_book;
pub mod contact;
pub mod user;

pub use address_book::{AddressBookListing, BookPrincipal, NewSharedBook, SharedAddressBook};
pub use contact::{ContactPage, ContactRecord, ExtendedInfo, FederatedPage, FederatedRow};
pub use user::{PlatformUser, Principal};
