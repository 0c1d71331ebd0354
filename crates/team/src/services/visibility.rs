//! Visibility and mutability resolver.
//!
//! Flags are recomputed on every read from the acting user's role, the
//! tenant match and the e-mail link. They are written into the outgoing
//! `extended_info` only and stripped again before anything is stored.

use std::collections::HashMap;

use team_contacts_core::{TenantId, UserRole};

use super::TeamContacts;
use crate::error::TeamContactsError;
use crate::identity::{IdentityOracle, SessionContext};
use crate::models::{ContactRecord, ExtendedInfo, PlatformUser, SharedAddressBook};
use crate::store::SharedContactStore;

/// Per-contact flags for one acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    /// The contact is the acting user's own team contact.
    pub is_self: bool,
    /// The acting user may view but not change the contact.
    pub read_only: bool,
}

impl Visibility {
    /// Write the flags into a contact's outgoing representation.
    pub fn apply(self, contact: &mut ContactRecord) {
        contact.extended_info = contact.extended_info.without_computed_flags();
        if self.is_self {
            contact.extended_info.set_flag(ExtendedInfo::IS_SELF, true);
        }
        contact
            .extended_info
            .set_flag(ExtendedInfo::READ_ONLY, self.read_only);
    }
}

/// Resolve the flags of `contact` for `actor`.
///
/// Returns `None` for personal contacts, which this resolver leaves alone.
#[must_use]
pub fn resolve_visibility(
    contact: &ContactRecord,
    actor: &PlatformUser,
    book: &SharedAddressBook,
    allow_edit_by_tenant_admins: bool,
) -> Option<Visibility> {
    if !book.contains(contact) {
        return None;
    }

    let is_self = contact.primary_email == actor.public_id;
    let writable = is_self
        || actor.role == UserRole::SuperAdmin
        || (allow_edit_by_tenant_admins && actor.is_tenant_admin_of(contact.tenant_id));

    Some(Visibility {
        is_self,
        read_only: !writable,
    })
}

impl<S: SharedContactStore, I: IdentityOracle> TeamContacts<S, I> {
    /// Annotate a single contact for the acting user.
    ///
    /// The system principal and personal contacts pass through untouched.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn annotate_contact(
        &self,
        session: &SessionContext,
        contact: ContactRecord,
    ) -> Result<ContactRecord, TeamContactsError> {
        let mut annotated = self.annotate_contacts(session, vec![contact]).await?;
        annotated
            .pop()
            .ok_or_else(|| TeamContactsError::not_found("contact"))
    }

    /// Annotate every contact of a list for the acting user.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn annotate_contacts(
        &self,
        session: &SessionContext,
        mut contacts: Vec<ContactRecord>,
    ) -> Result<Vec<ContactRecord>, TeamContactsError> {
        let principal = session.principal();
        let Some(actor) = principal.user() else {
            return Ok(contacts);
        };

        let mut books: HashMap<TenantId, Option<SharedAddressBook>> = HashMap::new();
        for contact in &mut contacts {
            let book = match books.get(&contact.tenant_id) {
                Some(book) => book.clone(),
                None => {
                    let book = self.existing_book(contact.tenant_id).await?;
                    books.insert(contact.tenant_id, book.clone());
                    book
                }
            };
            if let Some(book) = book {
                self.annotate_with(contact, actor, &book);
            }
        }
        Ok(contacts)
    }

    /// Apply the resolver against a known team book.
    pub(super) fn annotate_with(
        &self,
        contact: &mut ContactRecord,
        actor: &PlatformUser,
        book: &SharedAddressBook,
    ) {
        if let Some(visibility) = resolve_visibility(
            contact,
            actor,
            book,
            self.policy().allow_edit_by_tenant_admins,
        ) {
            visibility.apply(contact);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use team_contacts_core::{AddressBookId, ContactId, Email, UserId};

    use super::*;

    fn team_book() -> SharedAddressBook {
        SharedAddressBook {
            id: AddressBookId::new(10),
            tenant_id: TenantId::new(1),
            display_name: "Team".to_string(),
            change_token: 1,
            uri: "gab".to_string(),
            principal_uri: "principals/1_tenant".to_string(),
            created_at: Utc::now(),
        }
    }

    fn actor(id: i32, tenant: i32, role: UserRole) -> PlatformUser {
        PlatformUser {
            id: UserId::new(id),
            tenant_id: TenantId::new(tenant),
            role,
            public_id: Email::parse(&format!("user{id}@example.com")).unwrap(),
        }
    }

    fn contact(book: i32, email: &str) -> ContactRecord {
        ContactRecord {
            id: ContactId::new(1),
            owner_user_id: None,
            tenant_id: TenantId::new(1),
            address_book_id: AddressBookId::new(book),
            primary_email: Email::parse(email).unwrap(),
            display_name: String::new(),
            extended_info: ExtendedInfo::default(),
            linked_user_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_personal_contact_is_not_applicable() {
        let c = contact(3, "user2@example.com");
        let u = actor(1, 1, UserRole::NormalUser);
        assert_eq!(resolve_visibility(&c, &u, &team_book(), true), None);
    }

    #[test]
    fn test_own_contact_is_self_and_writable() {
        let c = contact(10, "user1@example.com");
        let u = actor(1, 1, UserRole::NormalUser);
        let v = resolve_visibility(&c, &u, &team_book(), false).unwrap();
        assert!(v.is_self);
        assert!(!v.read_only);
    }

    #[test]
    fn test_other_users_contact_is_read_only_for_normal_user() {
        let c = contact(10, "user2@example.com");
        let u = actor(1, 1, UserRole::NormalUser);
        let v = resolve_visibility(&c, &u, &team_book(), true).unwrap();
        assert!(!v.is_self);
        assert!(v.read_only);
    }

    #[test]
    fn test_super_admin_always_writable() {
        let c = contact(10, "user2@example.com");
        let u = actor(9, 5, UserRole::SuperAdmin);
        assert!(!resolve_visibility(&c, &u, &team_book(), false).unwrap().read_only);
    }

    #[test]
    fn test_tenant_admin_needs_flag_and_same_tenant() {
        let c = contact(10, "user2@example.com");
        let admin = actor(3, 1, UserRole::TenantAdmin);
        let foreign_admin = actor(4, 2, UserRole::TenantAdmin);

        assert!(resolve_visibility(&c, &admin, &team_book(), false).unwrap().read_only);
        assert!(!resolve_visibility(&c, &admin, &team_book(), true).unwrap().read_only);
        assert!(resolve_visibility(&c, &foreign_admin, &team_book(), true).unwrap().read_only);
    }

    #[test]
    fn test_apply_writes_flags_into_extended_info() {
        let mut c = contact(10, "user1@example.com");
        Visibility {
            is_self: true,
            read_only: false,
        }
        .apply(&mut c);
        assert!(c.extended_info.is_self());
        assert!(!c.extended_info.read_only());
        assert_eq!(c.extended_info.as_map().get("ReadOnly"), Some(&serde_json::Value::Bool(false)));
    }
}
