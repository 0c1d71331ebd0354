//! Split-schema backend.
//!
//! The team book is a `carddav.addressbook` owned by the tenant principal.
//! Each team contact is a card plus a `contacts.contact` row, joined
//! through the `contacts.contact_card` bridge. Card rows know nothing about
//! platform users, so the owning identity is recovered by joining
//! `platform.user_account` on e-mail when a query asks for it.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use team_contacts_core::{AddressBookId, ContactId, Email};

use super::RepositoryError;
use super::rows::{ContactRow, records};
use super::sql::{ColumnMap, push_order_and_page, push_predicate};
use crate::models::{
    BookPrincipal, ContactRecord, FederatedPage, FederatedRow, NewSharedBook, PlatformUser,
    SharedAddressBook,
};
use crate::query::{Column, ContactQuery};
use crate::store::{SchemaShape, SharedContactStore};

const CONTACT_COLUMNS: &str = "c.id, c.owner_user_id, c.tenant_id, \
     COALESCE(cd.addressbookid, c.address_book_id) AS address_book_id, \
     c.primary_email, c.display_name, c.extended_info, c.created_at";

const BRIDGE_JOIN: &str = " FROM contacts.contact c \
     LEFT JOIN contacts.contact_card cc ON cc.contact_id = c.id \
     LEFT JOIN carddav.card cd ON cd.id = cc.card_id";

const CARD_BOOK_COLUMNS: &str = "id, principaluri, uri, displayname, synctoken, created_at";

fn column(column: Column) -> &'static str {
    match column {
        Column::Id => "c.id",
        Column::OwnerUserId => "c.owner_user_id",
        Column::TenantId => "c.tenant_id",
        Column::AddressBookId => "COALESCE(cd.addressbookid, c.address_book_id)",
        Column::PrimaryEmail => "c.primary_email",
        Column::DisplayName => "c.display_name",
    }
}

const COLUMNS: ColumnMap = ColumnMap {
    column,
    created_at: "c.created_at",
};

#[derive(Debug, sqlx::FromRow)]
struct CardBookRow {
    id: AddressBookId,
    principaluri: String,
    uri: String,
    displayname: String,
    synctoken: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<CardBookRow> for SharedAddressBook {
    type Error = RepositoryError;

    fn try_from(row: CardBookRow) -> Result<Self, Self::Error> {
        let principal = BookPrincipal::parse(&row.principaluri).ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "address book {} has non-tenant principal {}",
                row.id, row.principaluri
            ))
        })?;
        Ok(Self {
            id: row.id,
            tenant_id: principal.tenant_id(),
            display_name: row.displayname,
            change_token: row.synctoken,
            uri: row.uri,
            principal_uri: row.principaluri,
            created_at: row.created_at,
        })
    }
}

/// Escape a vCard 3.0 text value.
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

/// Minimal vCard for a team contact.
fn render_vcard(uid: &str, display_name: &str, email: &Email) -> String {
    let name = if display_name.is_empty() {
        email.as_str()
    } else {
        display_name
    };
    format!(
        "BEGIN:VCARD\r\nVERSION:3.0\r\nUID:{uid}\r\nFN:{}\r\nEMAIL;TYPE=INTERNET:{}\r\nEND:VCARD\r\n",
        escape_text(name),
        escape_text(email.as_str()),
    )
}

/// Build the federated `SELECT` across contacts and the card bridge.
fn federated_select(query: &ContactQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(CONTACT_COLUMNS);
    match query.projection.shared_book {
        Some(book) => {
            qb.push(", CASE WHEN cd.addressbookid = ")
                .push_bind(book)
                .push(" THEN TRUE ELSE FALSE END AS is_shared");
        }
        None => {
            qb.push(", FALSE AS is_shared");
        }
    }
    if query.projection.link_identity {
        qb.push(", u.id AS linked_user_id");
        qb.push(BRIDGE_JOIN);
        qb.push(" LEFT JOIN platform.user_account u ON u.public_id = c.primary_email");
    } else {
        qb.push(", NULL::INTEGER AS linked_user_id");
        qb.push(BRIDGE_JOIN);
    }
    qb.push(" WHERE ");
    push_predicate(&mut qb, &query.predicate, COLUMNS);
    push_order_and_page(&mut qb, query, COLUMNS);
    qb
}

/// Team contacts stored as cards in a `CardDAV` store.
#[derive(Debug, Clone)]
pub struct PgCardStore {
    pool: PgPool,
}

impl PgCardStore {
    /// Create a store over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn bump_sync_token<'e, E>(executor: E, book: AddressBookId) -> Result<(), RepositoryError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query("UPDATE carddav.addressbook SET synctoken = synctoken + 1 WHERE id = $1")
            .bind(book)
            .execute(executor)
            .await?;
        Ok(())
    }
}

impl SharedContactStore for PgCardStore {
    fn shape(&self) -> SchemaShape {
        SchemaShape::Split
    }

    async fn find_books(
        &self,
        principal: BookPrincipal,
        uri: &str,
    ) -> Result<Vec<SharedAddressBook>, RepositoryError> {
        let rows: Vec<CardBookRow> = sqlx::query_as(&format!(
            "SELECT {CARD_BOOK_COLUMNS} FROM carddav.addressbook \
             WHERE principaluri = $1 AND uri = $2 ORDER BY created_at, id"
        ))
        .bind(principal.uri())
        .bind(uri)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SharedAddressBook::try_from).collect()
    }

    async fn create_book(&self, book: &NewSharedBook) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO carddav.addressbook (principaluri, uri, displayname)
            VALUES ($1, $2, $3)
            ON CONFLICT (principaluri, uri) DO NOTHING
            ",
        )
        .bind(book.principal.uri())
        .bind(&book.uri)
        .bind(&book.display_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_book(&self, id: AddressBookId) -> Result<Option<SharedAddressBook>, RepositoryError> {
        let row: Option<CardBookRow> = sqlx::query_as(&format!(
            "SELECT {CARD_BOOK_COLUMNS} FROM carddav.addressbook WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SharedAddressBook::try_from).transpose()
    }

    async fn get_contact(&self, id: ContactId) -> Result<Option<ContactRecord>, RepositoryError> {
        let row: Option<ContactRow> =
            sqlx::query_as(&format!("SELECT {CONTACT_COLUMNS}{BRIDGE_JOIN} WHERE c.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(ContactRecord::try_from).transpose()
    }

    async fn find_contacts_by_email(
        &self,
        book: AddressBookId,
        email: &Email,
    ) -> Result<Vec<ContactRecord>, RepositoryError> {
        let rows: Vec<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS}{BRIDGE_JOIN} \
             WHERE cd.addressbookid = $1 AND c.primary_email = $2 \
             ORDER BY c.created_at, c.id"
        ))
        .bind(book)
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        records(rows)
    }

    async fn list_book_contacts(&self, book: AddressBookId) -> Result<Vec<ContactRecord>, RepositoryError> {
        let rows: Vec<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS}{BRIDGE_JOIN} \
             WHERE cd.addressbookid = $1 ORDER BY c.display_name, c.id"
        ))
        .bind(book)
        .fetch_all(&self.pool)
        .await?;
        records(rows)
    }

    async fn list_federated(&self, query: &ContactQuery) -> Result<FederatedPage, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        count.push(BRIDGE_JOIN).push(" WHERE ");
        push_predicate(&mut count, &query.predicate, COLUMNS);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = federated_select(query);
        let rows: Vec<ContactRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let rows = rows
            .into_iter()
            .map(FederatedRow::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FederatedPage {
            total: u64::try_from(total).unwrap_or_default(),
            rows,
        })
    }

    async fn create_self_contact(
        &self,
        book: &SharedAddressBook,
        user: &PlatformUser,
    ) -> Result<Option<ContactRecord>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the book serializes concurrent creators for it.
        let locked: Option<AddressBookId> =
            sqlx::query_scalar("SELECT id FROM carddav.addressbook WHERE id = $1 FOR UPDATE")
                .bind(book.id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let exists: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM contacts.contact c
                JOIN contacts.contact_card cc ON cc.contact_id = c.id
                JOIN carddav.card cd ON cd.id = cc.card_id
                WHERE cd.addressbookid = $1 AND c.primary_email = $2
            )
            ",
        )
        .bind(book.id)
        .bind(&user.public_id)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            return Ok(None);
        }

        let uid = Uuid::new_v4().to_string();
        let card_id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO carddav.card (addressbookid, uri, carddata)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(book.id)
        .bind(format!("{uid}.vcf"))
        .bind(render_vcard(&uid, "", &user.public_id))
        .fetch_one(&mut *tx)
        .await?;

        let row: ContactRow = sqlx::query_as(
            r"
            INSERT INTO contacts.contact AS c (owner_user_id, tenant_id, address_book_id, primary_email)
            VALUES (NULL, $1, $2, $3)
            RETURNING c.id, c.owner_user_id, c.tenant_id, c.address_book_id,
                      c.primary_email, c.display_name, c.extended_info, c.created_at
            ",
        )
        .bind(book.tenant_id)
        .bind(book.id)
        .bind(&user.public_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO contacts.contact_card (contact_id, card_id) VALUES ($1, $2)")
            .bind(row.id)
            .bind(card_id)
            .execute(&mut *tx)
            .await?;

        Self::bump_sync_token(&mut *tx, book.id).await?;
        tx.commit().await?;

        tracing::debug!(
            book_id = %book.id,
            contact_id = %row.id,
            card_uri = %format!("{uid}.vcf"),
            "Created team card"
        );
        row.try_into().map(Some)
    }

    async fn update_contact(&self, contact: &ContactRecord) -> Result<ContactRecord, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            r"
            UPDATE contacts.contact
            SET primary_email = $2, display_name = $3, extended_info = $4
            WHERE id = $1
            ",
        )
        .bind(contact.id)
        .bind(&contact.primary_email)
        .bind(&contact.display_name)
        .bind(sqlx::types::Json(contact.extended_info.as_map()))
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let card: Option<(i32, AddressBookId, String)> = sqlx::query_as(
            r"
            SELECT cd.id, cd.addressbookid, cd.uri
            FROM carddav.card cd
            JOIN contacts.contact_card cc ON cc.card_id = cd.id
            WHERE cc.contact_id = $1
            ",
        )
        .bind(contact.id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((card_id, book, uri)) = card {
            let uid = uri.strip_suffix(".vcf").unwrap_or(&uri);
            sqlx::query("UPDATE carddav.card SET carddata = $2, lastmodified = NOW() WHERE id = $1")
                .bind(card_id)
                .bind(render_vcard(uid, &contact.display_name, &contact.primary_email))
                .execute(&mut *tx)
                .await?;
            Self::bump_sync_token(&mut *tx, book).await?;
        }

        let row: ContactRow =
            sqlx::query_as(&format!("SELECT {CONTACT_COLUMNS}{BRIDGE_JOIN} WHERE c.id = $1"))
                .bind(contact.id)
                .fetch_one(&mut *tx)
                .await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn remove_contact(&self, book: AddressBookId, id: ContactId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let cards = sqlx::query(
            r"
            DELETE FROM carddav.card cd
            USING contacts.contact_card cc
            WHERE cc.card_id = cd.id AND cc.contact_id = $2 AND cd.addressbookid = $1
            ",
        )
        .bind(book)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let removed = cards.rows_affected() > 0;
        if removed {
            sqlx::query("DELETE FROM contacts.contact WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            Self::bump_sync_token(&mut *tx, book).await?;
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn remove_self_contact(&self, book: AddressBookId, email: &Email) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r"
            WITH doomed AS (
                SELECT cc.contact_id, cc.card_id
                FROM contacts.contact_card cc
                JOIN carddav.card cd ON cd.id = cc.card_id
                JOIN contacts.contact c ON c.id = cc.contact_id
                WHERE cd.addressbookid = $1 AND c.primary_email = $2
            ), cards AS (
                DELETE FROM carddav.card WHERE id IN (SELECT card_id FROM doomed)
            )
            DELETE FROM contacts.contact WHERE id IN (SELECT contact_id FROM doomed)
            ",
        )
        .bind(book)
        .bind(email)
        .execute(&mut *tx)
        .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            Self::bump_sync_token(&mut *tx, book).await?;
        }
        tx.commit().await?;
        Ok(removed)
    }
}
