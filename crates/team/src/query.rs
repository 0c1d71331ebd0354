//! Composable contact predicates and paging.
//!
//! A [`ContactQuery`] is what the host's list/search endpoint hands to the
//! store: a predicate tree, an ordering and a page window. The federator
//! rewrites the predicate before the store applies ordering and paging, so
//! team rows and personal rows share one ordering and one page window.
//!
//! Predicates are evaluated in memory by [`Predicate::matches`] and
//! rendered to SQL by [`crate::db::sql`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use team_contacts_core::{AddressBookId, ContactId, TenantId, UserId};

use crate::models::ContactRecord;

/// A contact attribute a predicate can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    OwnerUserId,
    TenantId,
    AddressBookId,
    PrimaryEmail,
    DisplayName,
}

/// A literal compared against a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Text(String),
}

impl From<ContactId> for Value {
    fn from(id: ContactId) -> Self {
        Self::Int(id.as_i32())
    }
}

impl From<UserId> for Value {
    fn from(id: UserId) -> Self {
        Self::Int(id.as_i32())
    }
}

impl From<TenantId> for Value {
    fn from(id: TenantId) -> Self {
        Self::Int(id.as_i32())
    }
}

impl From<AddressBookId> for Value {
    fn from(id: AddressBookId) -> Self {
        Self::Int(id.as_i32())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// A boolean filter over contacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches every row.
    True,
    /// Matches no row.
    False,
    /// Column equals value.
    Eq(Column, Value),
    /// Column is one of the values. An empty list matches no row.
    In(Column, Vec<Value>),
    /// Case-insensitive substring match on a text column.
    Contains(Column, String),
    /// All children match. An empty list matches every row.
    And(Vec<Predicate>),
    /// Any child matches. An empty list matches no row.
    Or(Vec<Predicate>),
}

impl Predicate {
    /// `column = value`.
    pub fn eq(column: Column, value: impl Into<Value>) -> Self {
        Self::Eq(column, value.into())
    }

    /// Conjunction of `self` and `other`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut children) => {
                children.push(other);
                Self::And(children)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Disjunction of `self` and `other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut children) => {
                children.push(other);
                Self::Or(children)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Filter on a list of contact ids. An empty list selects nothing,
    /// never everything.
    #[must_use]
    pub fn ids(ids: &[ContactId]) -> Self {
        if ids.is_empty() {
            return Self::False;
        }
        Self::In(Column::Id, ids.iter().copied().map(Value::from).collect())
    }

    /// Evaluate against a contact.
    #[must_use]
    pub fn matches(&self, contact: &ContactRecord) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::Eq(column, value) => column_equals(contact, *column, value),
            Self::In(column, values) => values.iter().any(|v| column_equals(contact, *column, v)),
            Self::Contains(column, needle) => text_of(contact, *column)
                .is_some_and(|text| text.to_lowercase().contains(&needle.to_lowercase())),
            Self::And(children) => children.iter().all(|p| p.matches(contact)),
            Self::Or(children) => children.iter().any(|p| p.matches(contact)),
        }
    }
}

fn column_equals(contact: &ContactRecord, column: Column, value: &Value) -> bool {
    match (column, value) {
        (Column::Id, Value::Int(v)) => contact.id.as_i32() == *v,
        (Column::OwnerUserId, Value::Int(v)) => contact.owner_user_id.map(|u| u.as_i32()) == Some(*v),
        (Column::TenantId, Value::Int(v)) => contact.tenant_id.as_i32() == *v,
        (Column::AddressBookId, Value::Int(v)) => contact.address_book_id.as_i32() == *v,
        (Column::PrimaryEmail | Column::DisplayName, Value::Text(v)) => {
            text_of(contact, column) == Some(v.as_str())
        }
        _ => false,
    }
}

fn text_of(contact: &ContactRecord, column: Column) -> Option<&str> {
    match column {
        Column::PrimaryEmail => Some(contact.primary_email.as_str()),
        Column::DisplayName => Some(contact.display_name.as_str()),
        _ => None,
    }
}

/// Field a contact list is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Name,
    Email,
    Created,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Extra columns a federated query must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Projection {
    /// When set, rows from this book get `is_shared = true`.
    pub shared_book: Option<AddressBookId>,
    /// Resolve `linked_user_id` by joining platform users on e-mail.
    pub link_identity: bool,
}

/// A list/search request against the contacts relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactQuery {
    pub predicate: Predicate,
    pub sort: SortField,
    pub order: SortOrder,
    pub offset: u32,
    /// `None` returns every row from `offset` on.
    pub limit: Option<u32>,
    /// Id filter requested by the caller. The base predicate already
    /// applies it to personal rows; the federator applies it to team rows.
    pub ids: Option<Vec<ContactId>>,
    pub projection: Projection,
}

impl ContactQuery {
    /// Query with the given predicate, default ordering and no paging.
    #[must_use]
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            sort: SortField::default(),
            order: SortOrder::default(),
            offset: 0,
            limit: None,
            ids: None,
            projection: Projection::default(),
        }
    }

    /// Set the ordering.
    #[must_use]
    pub const fn sorted_by(mut self, sort: SortField, order: SortOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    /// Set the page window.
    #[must_use]
    pub const fn page(mut self, offset: u32, limit: u32) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Restrict to the given contact ids.
    #[must_use]
    pub fn with_ids(mut self, ids: Vec<ContactId>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Total order used by every backend: sort field, then id.
    #[must_use]
    pub fn compare(&self, a: &ContactRecord, b: &ContactRecord) -> Ordering {
        let primary = match self.sort {
            SortField::Name => a.display_name.cmp(&b.display_name),
            SortField::Email => a.primary_email.cmp(&b.primary_email),
            SortField::Created => a.created_at.cmp(&b.created_at),
        };
        let primary = match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use team_contacts_core::Email;

    use super::*;
    use crate::models::ExtendedInfo;

    fn contact(id: i32, book: i32, email: &str, name: &str) -> ContactRecord {
        ContactRecord {
            id: ContactId::new(id),
            owner_user_id: Some(UserId::new(1)),
            tenant_id: TenantId::new(1),
            address_book_id: AddressBookId::new(book),
            primary_email: Email::parse(email).unwrap(),
            display_name: name.to_string(),
            extended_info: ExtendedInfo::default(),
            linked_user_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_id_list_selects_nothing() {
        let c = contact(1, 1, "ann@example.com", "Ann");
        assert_eq!(Predicate::ids(&[]), Predicate::False);
        assert!(!Predicate::ids(&[]).matches(&c));
        assert!(!Predicate::In(Column::Id, vec![]).matches(&c));
        assert!(Predicate::ids(&[ContactId::new(1)]).matches(&c));
    }

    #[test]
    fn test_empty_or_matches_nothing_and_empty_and_matches_everything() {
        let c = contact(1, 1, "ann@example.com", "Ann");
        assert!(!Predicate::Or(vec![]).matches(&c));
        assert!(Predicate::And(vec![]).matches(&c));
    }

    #[test]
    fn test_or_flattens_into_existing_disjunction() {
        let p = Predicate::eq(Column::AddressBookId, AddressBookId::new(1))
            .or(Predicate::eq(Column::AddressBookId, AddressBookId::new(2)))
            .or(Predicate::False);
        assert!(matches!(&p, Predicate::Or(children) if children.len() == 3));
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let c = contact(1, 1, "ann@example.com", "Ann Lee");
        assert!(Predicate::Contains(Column::DisplayName, "lee".into()).matches(&c));
        assert!(Predicate::Contains(Column::PrimaryEmail, "EXAMPLE".into()).matches(&c));
        assert!(!Predicate::Contains(Column::Id, "1".into()).matches(&c));
    }

    #[test]
    fn test_type_mismatch_never_matches() {
        let c = contact(1, 1, "ann@example.com", "Ann");
        assert!(!Predicate::Eq(Column::Id, Value::Text("1".into())).matches(&c));
    }

    #[test]
    fn test_compare_breaks_ties_by_id() {
        let query = ContactQuery::new(Predicate::True).sorted_by(SortField::Name, SortOrder::Desc);
        let a = contact(1, 1, "a@example.com", "Same");
        let b = contact(2, 1, "b@example.com", "Same");
        assert_eq!(query.compare(&a, &b), Ordering::Less);
    }
}
