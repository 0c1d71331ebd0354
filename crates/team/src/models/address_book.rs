//! Team address book types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use team_contacts_core::{AddressBookId, TenantId};

use super::ContactRecord;

const PRINCIPALS_PREFIX: &str = "principals/";
const TENANT_PRINCIPAL_SUFFIX: &str = "_tenant";

/// The card store principal that owns a tenant's team book.
///
/// Derived deterministically from the tenant id, so every caller in the
/// tenant resolves the same book without any shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BookPrincipal {
    tenant_id: TenantId,
}

impl BookPrincipal {
    /// Principal for a tenant.
    #[must_use]
    pub const fn for_tenant(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    /// Tenant this principal belongs to.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Principal URI, e.g. `principals/7_tenant`.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("{PRINCIPALS_PREFIX}{}{TENANT_PRINCIPAL_SUFFIX}", self.tenant_id)
    }

    /// Parse a principal URI produced by [`BookPrincipal::uri`].
    #[must_use]
    pub fn parse(uri: &str) -> Option<Self> {
        let tenant = uri
            .strip_prefix(PRINCIPALS_PREFIX)?
            .strip_suffix(TENANT_PRINCIPAL_SUFFIX)?;
        tenant.parse().ok().map(Self::for_tenant)
    }
}

/// A tenant's team address book (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedAddressBook {
    /// Backend key of the book.
    pub id: AddressBookId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name shown in address book lists.
    pub display_name: String,
    /// Monotonic token bumped on every mutation of the book's contacts.
    pub change_token: i64,
    /// Stable slug of the book under its principal.
    pub uri: String,
    /// Principal URI that owns the book.
    pub principal_uri: String,
    /// When the book was provisioned. Earliest wins if duplicates exist.
    pub created_at: DateTime<Utc>,
}

impl SharedAddressBook {
    /// Whether a contact lives in this book, i.e. is a shared contact.
    #[must_use]
    pub fn contains(&self, contact: &ContactRecord) -> bool {
        contact.address_book_id == self.id
    }

    /// How this book appears in the host's address book list.
    #[must_use]
    pub fn listing(&self) -> AddressBookListing {
        AddressBookListing {
            id: AddressBookListing::TEAM_ID,
            entity_id: self.id,
            ctag: self.change_token,
            display: true,
            order: 1,
            display_name: self.display_name.clone(),
            uri: self.uri.clone(),
        }
    }
}

/// Parameters for provisioning a team book.
#[derive(Debug, Clone)]
pub struct NewSharedBook {
    /// Owning principal.
    pub principal: BookPrincipal,
    /// Slug under the principal.
    pub uri: String,
    /// Display name.
    pub display_name: String,
}

/// Entry appended to the host's list of address books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddressBookListing {
    /// Storage name of the book (`team`).
    pub id: &'static str,
    /// Backend key of the book.
    pub entity_id: AddressBookId,
    /// Change token, used by clients for cache invalidation.
    #[serde(rename = "CTag")]
    pub ctag: i64,
    /// Whether the book is shown.
    pub display: bool,
    /// Sort position among the user's books.
    pub order: i32,
    /// Display name.
    pub display_name: String,
    /// Slug of the book.
    pub uri: String,
}

impl AddressBookListing {
    /// Storage name under which the team book is exposed.
    pub const TEAM_ID: &'static str = "team";
}
