//! Row types shared by the Postgres backends.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;

use team_contacts_core::{AddressBookId, ContactId, TenantId, UserId};

use super::{RepositoryError, parse_email};
use crate::models::{ContactRecord, ExtendedInfo, FederatedRow, SharedAddressBook};

/// Columns selected for a book, in `BookRow` order.
pub const BOOK_COLUMNS: &str =
    "id, tenant_id, display_name, change_token, uri, principal_uri, created_at";

#[derive(Debug, sqlx::FromRow)]
pub struct BookRow {
    pub id: AddressBookId,
    pub tenant_id: TenantId,
    pub display_name: String,
    pub change_token: i64,
    pub uri: String,
    pub principal_uri: String,
    pub created_at: DateTime<Utc>,
}

impl From<BookRow> for SharedAddressBook {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            display_name: row.display_name,
            change_token: row.change_token,
            uri: row.uri,
            principal_uri: row.principal_uri,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ContactRow {
    pub id: ContactId,
    pub owner_user_id: Option<UserId>,
    pub tenant_id: TenantId,
    pub address_book_id: AddressBookId,
    pub primary_email: String,
    pub display_name: String,
    pub extended_info: Json<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub linked_user_id: Option<UserId>,
    #[sqlx(default)]
    pub is_shared: Option<bool>,
}

impl TryFrom<ContactRow> for ContactRecord {
    type Error = RepositoryError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner_user_id: row.owner_user_id,
            tenant_id: row.tenant_id,
            address_book_id: row.address_book_id,
            primary_email: parse_email(&row.primary_email)?,
            display_name: row.display_name,
            extended_info: ExtendedInfo::from_map(row.extended_info.0),
            linked_user_id: row.linked_user_id,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<ContactRow> for FederatedRow {
    type Error = RepositoryError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        let is_shared = row.is_shared.unwrap_or(false);
        Ok(Self {
            record: row.try_into()?,
            is_shared,
        })
    }
}

/// Convert a batch of rows, failing on the first corrupt one.
pub fn records(rows: Vec<ContactRow>) -> Result<Vec<ContactRecord>, RepositoryError> {
    rows.into_iter().map(ContactRecord::try_from).collect()
}
