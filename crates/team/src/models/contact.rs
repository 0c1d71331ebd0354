//! Contact records and the ad-hoc flags attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use team_contacts_core::{AddressBookId, ContactId, Email, TenantId, UserId};

/// Free-form per-contact information.
///
/// The `IsSelf` and `ReadOnly` keys are computed on every read for the
/// acting user and must never reach the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtendedInfo(Map<String, Value>);

impl ExtendedInfo {
    /// Key marking the acting user's own team contact.
    pub const IS_SELF: &'static str = "IsSelf";
    /// Key marking a team contact the acting user may not modify.
    pub const READ_ONLY: &'static str = "ReadOnly";

    /// Wrap an existing JSON object.
    #[must_use]
    pub const fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Borrow the underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Read a boolean flag; anything but `true` counts as unset.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Set a boolean flag.
    pub fn set_flag(&mut self, key: &str, value: bool) {
        self.0.insert(key.to_string(), Value::Bool(value));
    }

    /// Insert an arbitrary value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Whether the contact was annotated as the acting user's own.
    #[must_use]
    pub fn is_self(&self) -> bool {
        self.flag(Self::IS_SELF)
    }

    /// Whether the contact was annotated as read-only for the acting user.
    #[must_use]
    pub fn read_only(&self) -> bool {
        self.flag(Self::READ_ONLY)
    }

    /// Copy without the per-request computed flags, suitable for storage.
    #[must_use]
    pub fn without_computed_flags(&self) -> Self {
        let mut map = self.0.clone();
        map.remove(Self::IS_SELF);
        map.remove(Self::READ_ONLY);
        Self(map)
    }
}

/// A personal or team contact (domain type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Native key in the store holding the contact.
    pub id: ContactId,
    /// Platform user owning the record, if linked.
    pub owner_user_id: Option<UserId>,
    /// Tenant of the record.
    pub tenant_id: TenantId,
    /// Book the record lives in. Equal to the team book id for shared contacts.
    pub address_book_id: AddressBookId,
    /// Primary e-mail. On team contacts this is the link to a platform user.
    pub primary_email: Email,
    /// Display name.
    pub display_name: String,
    /// Ad-hoc flags and host extensions.
    pub extended_info: ExtendedInfo,
    /// Platform user this record represents, resolved by e-mail match.
    /// Weak: lookup only, never ownership.
    pub linked_user_id: Option<UserId>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl ContactRecord {
    /// Format as an address-list entry: `"Name"<email>` or the bare e-mail.
    #[must_use]
    pub fn mailbox(&self) -> String {
        if self.display_name.is_empty() {
            self.primary_email.to_string()
        } else {
            format!("\"{}\"<{}>", self.display_name, self.primary_email)
        }
    }
}

/// A row returned by a federated list query.
#[derive(Debug, Clone, PartialEq)]
pub struct FederatedRow {
    /// The contact as stored.
    pub record: ContactRecord,
    /// Derived column: whether the row came from the team book.
    pub is_shared: bool,
}

/// One page of federated rows plus the total across all pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FederatedPage {
    /// Number of rows matching the predicate before paging.
    pub total: u64,
    /// Rows of this page, in query order.
    pub rows: Vec<FederatedRow>,
}

/// One page of contacts ready to hand back to the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContactPage {
    /// Number of contacts matching the query before paging.
    pub total: u64,
    /// Contacts of this page, annotated for the acting user.
    pub contacts: Vec<ContactRecord>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_default_to_false() {
        let info = ExtendedInfo::default();
        assert!(!info.is_self());
        assert!(!info.read_only());
    }

    #[test]
    fn test_non_boolean_flag_counts_as_unset() {
        let mut info = ExtendedInfo::default();
        info.insert(ExtendedInfo::READ_ONLY, Value::String("true".into()));
        assert!(!info.read_only());
    }

    #[test]
    fn test_without_computed_flags_keeps_host_keys() {
        let mut info = ExtendedInfo::default();
        info.set_flag(ExtendedInfo::IS_SELF, true);
        info.set_flag(ExtendedInfo::READ_ONLY, true);
        info.insert("Department", Value::String("Sales".into()));

        let stored = info.without_computed_flags();
        assert!(!stored.is_self());
        assert!(!stored.read_only());
        assert_eq!(stored.as_map().get("Department").unwrap(), "Sales");
    }

    #[test]
    fn test_mailbox_matches_address_list_format() {
        let mut contact = ContactRecord {
            id: ContactId::new(1),
            owner_user_id: None,
            tenant_id: TenantId::new(1),
            address_book_id: AddressBookId::new(10),
            primary_email: Email::parse("ann@example.com").unwrap(),
            display_name: String::new(),
            extended_info: ExtendedInfo::default(),
            linked_user_id: None,
            created_at: Utc::now(),
        };
        assert_eq!(contact.mailbox(), "ann@example.com");

        contact.display_name = "Ann Lee".to_string();
        assert_eq!(contact.mailbox(), "\"Ann Lee\"<ann@example.com>");
    }
}
