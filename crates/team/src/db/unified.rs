//! Unified-schema backend.
//!
//! Team contacts live in `contacts.contact` next to personal contacts and
//! are told apart only by `address_book_id`. Team books are rows of
//! `contacts.address_book` owned by the tenant principal.

use sqlx::{PgPool, Postgres, QueryBuilder};

use team_contacts_core::{AddressBookId, ContactId, Email};

use super::RepositoryError;
use super::rows::{BOOK_COLUMNS, BookRow, ContactRow, records};
use super::sql::{ColumnMap, push_order_and_page, push_predicate};
use crate::models::{
    BookPrincipal, ContactRecord, FederatedPage, FederatedRow, NewSharedBook, PlatformUser,
    SharedAddressBook,
};
use crate::query::{Column, ContactQuery};
use crate::store::{SchemaShape, SharedContactStore};

const CONTACT_COLUMNS: &str = "c.id, c.owner_user_id, c.tenant_id, c.address_book_id, \
     c.primary_email, c.display_name, c.extended_info, c.created_at";

fn column(column: Column) -> &'static str {
    match column {
        Column::Id => "c.id",
        Column::OwnerUserId => "c.owner_user_id",
        Column::TenantId => "c.tenant_id",
        Column::AddressBookId => "c.address_book_id",
        Column::PrimaryEmail => "c.primary_email",
        Column::DisplayName => "c.display_name",
    }
}

const COLUMNS: ColumnMap = ColumnMap {
    column,
    created_at: "c.created_at",
};

/// Team contacts stored in the host's contacts table.
#[derive(Debug, Clone)]
pub struct PgUnifiedStore {
    pool: PgPool,
}

impl PgUnifiedStore {
    /// Create a store over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn bump_change_token<'e, E>(executor: E, book: AddressBookId) -> Result<(), RepositoryError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query("UPDATE contacts.address_book SET change_token = change_token + 1 WHERE id = $1")
            .bind(book)
            .execute(executor)
            .await?;
        Ok(())
    }
}

/// Build the federated `SELECT` for the unified table.
fn federated_select(query: &ContactQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(CONTACT_COLUMNS);
    match query.projection.shared_book {
        Some(book) => {
            qb.push(", (c.address_book_id = ").push_bind(book).push(") AS is_shared");
        }
        None => {
            qb.push(", FALSE AS is_shared");
        }
    }
    if query.projection.link_identity {
        qb.push(", u.id AS linked_user_id FROM contacts.contact c")
            .push(" LEFT JOIN platform.user_account u ON u.public_id = c.primary_email");
    } else {
        qb.push(", NULL::INTEGER AS linked_user_id FROM contacts.contact c");
    }
    qb.push(" WHERE ");
    push_predicate(&mut qb, &query.predicate, COLUMNS);
    push_order_and_page(&mut qb, query, COLUMNS);
    qb
}

impl SharedContactStore for PgUnifiedStore {
    fn shape(&self) -> SchemaShape {
        SchemaShape::Unified
    }

    async fn find_books(
        &self,
        principal: BookPrincipal,
        uri: &str,
    ) -> Result<Vec<SharedAddressBook>, RepositoryError> {
        let rows: Vec<BookRow> = sqlx::query_as(&format!(
            "SELECT {BOOK_COLUMNS} FROM contacts.address_book \
             WHERE principal_uri = $1 AND uri = $2 ORDER BY created_at, id"
        ))
        .bind(principal.uri())
        .bind(uri)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_book(&self, book: &NewSharedBook) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO contacts.address_book (tenant_id, principal_uri, uri, display_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (principal_uri, uri) DO NOTHING
            ",
        )
        .bind(book.principal.tenant_id())
        .bind(book.principal.uri())
        .bind(&book.uri)
        .bind(&book.display_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_book(&self, id: AddressBookId) -> Result<Option<SharedAddressBook>, RepositoryError> {
        let row: Option<BookRow> = sqlx::query_as(&format!(
            "SELECT {BOOK_COLUMNS} FROM contacts.address_book WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get_contact(&self, id: ContactId) -> Result<Option<ContactRecord>, RepositoryError> {
        let row: Option<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts.contact c WHERE c.id = $1"
        ))
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
            "SELECT {CONTACT_COLUMNS} FROM contacts.contact c \
             WHERE c.address_book_id = $1 AND c.primary_email = $2 \
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
            "SELECT {CONTACT_COLUMNS} FROM contacts.contact c \
             WHERE c.address_book_id = $1 ORDER BY c.display_name, c.id"
        ))
        .bind(book)
        .fetch_all(&self.pool)
        .await?;
        records(rows)
    }

    async fn list_federated(&self, query: &ContactQuery) -> Result<FederatedPage, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM contacts.contact c WHERE ");
        push_predicate(&mut count, &query.predicate, COLUMNS);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = federated_select(query);
        let rows: Vec<ContactRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
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

        // Existence check and insert in one statement. There is no unique
        // index on (book, email); the bootstrap scan prunes legacy duplicates.
        let row: Option<ContactRow> = sqlx::query_as(
            r"
            INSERT INTO contacts.contact AS c (owner_user_id, tenant_id, address_book_id, primary_email)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (
                SELECT 1 FROM contacts.contact
                WHERE address_book_id = $3 AND primary_email = $4
            )
            RETURNING c.id, c.owner_user_id, c.tenant_id, c.address_book_id,
                      c.primary_email, c.display_name, c.extended_info, c.created_at
            ",
        )
        .bind(user.id)
        .bind(book.tenant_id)
        .bind(book.id)
        .bind(&user.public_id)
        .fetch_optional(&mut *tx)
        .await?;

        if row.is_some() {
            Self::bump_change_token(&mut *tx, book.id).await?;
        }
        tx.commit().await?;

        row.map(ContactRecord::try_from).transpose()
    }

    async fn update_contact(&self, contact: &ContactRecord) -> Result<ContactRecord, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let row: Option<ContactRow> = sqlx::query_as(
            r"
            UPDATE contacts.contact AS c
            SET primary_email = $2, display_name = $3, extended_info = $4
            WHERE c.id = $1
            RETURNING c.id, c.owner_user_id, c.tenant_id, c.address_book_id,
                      c.primary_email, c.display_name, c.extended_info, c.created_at
            ",
        )
        .bind(contact.id)
        .bind(&contact.primary_email)
        .bind(&contact.display_name)
        .bind(sqlx::types::Json(contact.extended_info.as_map()))
        .fetch_optional(&mut *tx)
        .await?;

        let row = row.ok_or(RepositoryError::NotFound)?;
        Self::bump_change_token(&mut *tx, row.address_book_id).await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn remove_contact(&self, book: AddressBookId, id: ContactId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM contacts.contact WHERE address_book_id = $1 AND id = $2")
            .bind(book)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let removed = result.rows_affected() > 0;
        if removed {
            Self::bump_change_token(&mut *tx, book).await?;
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn remove_self_contact(&self, book: AddressBookId, email: &Email) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "DELETE FROM contacts.contact WHERE address_book_id = $1 AND primary_email = $2",
        )
        .bind(book)
        .bind(email)
        .execute(&mut *tx)
        .await?;
        let removed = result.rows_affected();
        if removed > 0 {
            Self::bump_change_token(&mut *tx, book).await?;
        }
        tx.commit().await?;
        Ok(removed)
    }
}
