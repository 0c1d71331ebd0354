//! Access-control gate for team contacts and the team book.
//!
//! Only writes are governed here. Reads are allowed once the identity
//! oracle has granted tenant visibility. Decisions are computed per call
//! and never cached, because role and policy may change between calls.

use serde::Serialize;
use tracing::{debug, instrument};

use team_contacts_core::{Access, AddressBookId, ContactId, UserRole};

use super::TeamContacts;
use super::visibility::resolve_visibility;
use crate::error::TeamContactsError;
use crate::identity::{IdentityOracle, SessionContext};
use crate::models::{BookPrincipal, ContactRecord, PlatformUser, Principal, SharedAddressBook};
use crate::store::SharedContactStore;

/// What an access check is about.
#[derive(Debug, Clone, Copy)]
pub enum AccessTarget<'a> {
    /// A stored contact.
    Contact(&'a ContactRecord),
    /// An address book's own metadata (rename, delete).
    Book(AddressBookId),
    /// Adding contacts to an address book.
    BookContents(AddressBookId),
}

/// Outcome of an access check. Transient; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: String,
}

impl AccessDecision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }

    /// Turn a denial into `TeamContactsError::AccessDenied`.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::AccessDenied` if the decision is a denial.
    pub fn into_result(self) -> Result<(), TeamContactsError> {
        if self.allowed {
            Ok(())
        } else {
            Err(TeamContactsError::AccessDenied(self.reason))
        }
    }
}

/// Write decision for a team contact.
fn contact_write_decision(
    contact: &ContactRecord,
    actor: &PlatformUser,
    book: &SharedAddressBook,
    allow_edit_by_tenant_admins: bool,
) -> AccessDecision {
    if actor.role == UserRole::SuperAdmin {
        return AccessDecision::allow("super admin");
    }
    if contact.primary_email == actor.public_id {
        return AccessDecision::allow("own team contact");
    }

    let read_only = resolve_visibility(contact, actor, book, allow_edit_by_tenant_admins)
        .is_none_or(|v| v.read_only);
    if actor.role == UserRole::TenantAdmin
        && allow_edit_by_tenant_admins
        && actor.tenant_id == contact.tenant_id
        && !read_only
    {
        return AccessDecision::allow("tenant admin of the contact's tenant");
    }

    AccessDecision::deny(format!(
        "team contact {} is read-only for user {}",
        contact.id, actor.id
    ))
}

/// Decision for adding contacts to a team book.
fn book_contents_write_decision(
    book: &SharedAddressBook,
    actor: &PlatformUser,
    allow_edit_by_tenant_admins: bool,
) -> AccessDecision {
    if actor.role == UserRole::SuperAdmin {
        return AccessDecision::allow("super admin");
    }
    if allow_edit_by_tenant_admins && actor.is_tenant_admin_of(book.tenant_id) {
        return AccessDecision::allow("tenant admin of the book's tenant");
    }
    AccessDecision::deny(format!(
        "user {} may not add contacts to team book {}",
        actor.id, book.id
    ))
}

impl<S: SharedContactStore, I: IdentityOracle> TeamContacts<S, I> {
    /// Whether `book` is a tenant's team book under the current policy.
    pub(super) fn is_team_book(&self, book: &SharedAddressBook) -> bool {
        book.uri == self.policy().book_uri && BookPrincipal::parse(&book.principal_uri).is_some()
    }

    async fn team_book_by_id(
        &self,
        id: AddressBookId,
    ) -> Result<Option<SharedAddressBook>, TeamContactsError> {
        let book = self.store().get_book(id).await?;
        Ok(book.filter(|b| self.is_team_book(b)))
    }

    /// Decide whether the acting principal may perform `access` on `target`.
    ///
    /// Returns `None` when the target is not part of a team book; the
    /// host's own rules apply then.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, session, target), fields(access = ?access))]
    pub async fn check_access(
        &self,
        session: &SessionContext,
        target: AccessTarget<'_>,
        access: Access,
    ) -> Result<Option<AccessDecision>, TeamContactsError> {
        let principal = session.principal();
        let flag = self.policy().allow_edit_by_tenant_admins;

        let decision = match target {
            AccessTarget::Contact(contact) => {
                let Some(book) = self
                    .existing_book(contact.tenant_id)
                    .await?
                    .filter(|b| b.contains(contact))
                else {
                    return Ok(None);
                };
                match (access, &principal) {
                    (Access::Read, _) => AccessDecision::allow("reads are not gated"),
                    (Access::Write, Principal::System) => AccessDecision::allow("system principal"),
                    (Access::Write, Principal::User(actor)) => {
                        contact_write_decision(contact, actor, &book, flag)
                    }
                }
            }
            AccessTarget::Book(id) => {
                if self.team_book_by_id(id).await?.is_none() {
                    return Ok(None);
                }
                match access {
                    Access::Read => AccessDecision::allow("reads are not gated"),
                    Access::Write => {
                        AccessDecision::deny("the team address book is managed by the platform")
                    }
                }
            }
            AccessTarget::BookContents(id) => {
                let Some(book) = self.team_book_by_id(id).await? else {
                    return Ok(None);
                };
                match (access, &principal) {
                    (Access::Read, _) => AccessDecision::allow("reads are not gated"),
                    (Access::Write, Principal::System) => AccessDecision::allow("system principal"),
                    (Access::Write, Principal::User(actor)) => {
                        book_contents_write_decision(&book, actor, flag)
                    }
                }
            }
        };

        debug!(allowed = decision.allowed, reason = %decision.reason, "Access decision");
        Ok(Some(decision))
    }

    /// Like [`Self::check_access`], failing on a denial.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::AccessDenied` on denial.
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn enforce(
        &self,
        session: &SessionContext,
        target: AccessTarget<'_>,
        access: Access,
    ) -> Result<(), TeamContactsError> {
        match self.check_access(session, target, access).await? {
            Some(decision) => decision.into_result(),
            None => Ok(()),
        }
    }

    /// Sanitize an update request before it reaches the store.
    ///
    /// Computed flags are stripped. For team contacts the write gate is
    /// enforced and the stored `primary_email` is restored silently, since
    /// it links the contact to its platform user.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::NotFound` if the contact does not exist.
    /// Returns `TeamContactsError::AccessDenied` if the write is not allowed.
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    pub async fn guard_update(
        &self,
        session: &SessionContext,
        mut incoming: ContactRecord,
    ) -> Result<ContactRecord, TeamContactsError> {
        let stored = self
            .store()
            .get_contact(incoming.id)
            .await?
            .ok_or_else(|| TeamContactsError::not_found(format!("contact {}", incoming.id)))?;

        incoming.extended_info = incoming.extended_info.without_computed_flags();

        let is_team = self
            .existing_book(stored.tenant_id)
            .await?
            .is_some_and(|b| b.contains(&stored));
        if !is_team {
            return Ok(incoming);
        }

        self.enforce(session, AccessTarget::Contact(&stored), Access::Write)
            .await?;

        if incoming.primary_email != stored.primary_email {
            debug!(contact_id = %stored.id, "Ignoring primary e-mail change on team contact");
        }
        incoming.primary_email = stored.primary_email;
        incoming.address_book_id = stored.address_book_id;
        incoming.tenant_id = stored.tenant_id;
        incoming.owner_user_id = stored.owner_user_id;
        incoming.created_at = stored.created_at;
        Ok(incoming)
    }

    /// Apply an update through the gate and return the annotated result.
    ///
    /// # Errors
    ///
    /// See [`Self::guard_update`].
    #[instrument(skip(self, session, incoming), fields(contact_id = %incoming.id))]
    pub async fn update_contact(
        &self,
        session: &SessionContext,
        incoming: ContactRecord,
    ) -> Result<ContactRecord, TeamContactsError> {
        let guarded = self.guard_update(session, incoming).await?;
        let updated = self.store().update_contact(&guarded).await?;
        self.annotate_contact(session, updated).await
    }

    /// Delete a contact through the gate.
    ///
    /// # Errors
    ///
    /// Returns `TeamContactsError::NotFound` if the contact does not exist.
    /// Returns `TeamContactsError::AccessDenied` if the write is not allowed.
    /// Returns `TeamContactsError::BackendUnavailable` if the store fails.
    #[instrument(skip(self, session), fields(contact_id = %id))]
    pub async fn delete_contact(
        &self,
        session: &SessionContext,
        id: ContactId,
    ) -> Result<bool, TeamContactsError> {
        let stored = self
            .store()
            .get_contact(id)
            .await?
            .ok_or_else(|| TeamContactsError::not_found(format!("contact {id}")))?;
        self.enforce(session, AccessTarget::Contact(&stored), Access::Write)
            .await?;
        Ok(self.store().remove_contact(stored.address_book_id, id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use team_contacts_core::{Email, TenantId, UserId};

    use super::*;
    use crate::models::ExtendedInfo;

    fn book() -> SharedAddressBook {
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

    fn shared_contact(email: &str) -> ContactRecord {
        ContactRecord {
            id: ContactId::new(5),
            owner_user_id: None,
            tenant_id: TenantId::new(1),
            address_book_id: AddressBookId::new(10),
            primary_email: Email::parse(email).unwrap(),
            display_name: String::new(),
            extended_info: ExtendedInfo::default(),
            linked_user_id: None,
            created_at: Utc::now(),
        }
    }

    /// Exhaustive check of the write rule over roles, flag and tenants.
    #[test]
    fn test_write_rule_matches_role_table() {
        let roles = [UserRole::SuperAdmin, UserRole::TenantAdmin, UserRole::NormalUser];
        for role in roles {
            for flag in [false, true] {
                for tenant in [1, 2] {
                    for own in [false, true] {
                        let user = actor(1, tenant, role);
                        let email = if own { "user1@example.com" } else { "user2@example.com" };
                        let contact = shared_contact(email);
                        let expected = role == UserRole::SuperAdmin
                            || own
                            || (role == UserRole::TenantAdmin && flag && tenant == 1);
                        let decision = contact_write_decision(&contact, &user, &book(), flag);
                        assert_eq!(
                            decision.allowed, expected,
                            "role={role} flag={flag} tenant={tenant} own={own}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_book_contents_write() {
        let b = book();
        assert!(book_contents_write_decision(&b, &actor(1, 5, UserRole::SuperAdmin), false).allowed);
        assert!(!book_contents_write_decision(&b, &actor(1, 1, UserRole::TenantAdmin), false).allowed);
        assert!(book_contents_write_decision(&b, &actor(1, 1, UserRole::TenantAdmin), true).allowed);
        assert!(!book_contents_write_decision(&b, &actor(1, 2, UserRole::TenantAdmin), true).allowed);
        assert!(!book_contents_write_decision(&b, &actor(1, 1, UserRole::NormalUser), true).allowed);
    }

    #[test]
    fn test_denial_maps_to_access_denied() {
        let err = AccessDecision::deny("nope").into_result().unwrap_err();
        assert!(matches!(err, TeamContactsError::AccessDenied(reason) if reason == "nope"));
        assert!(AccessDecision::allow("ok").into_result().is_ok());
    }
}
