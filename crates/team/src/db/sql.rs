//! Rendering of [`ContactQuery`] values into `QueryBuilder` SQL.
//!
//! Both Postgres backends share this renderer and differ only in the
//! [`ColumnMap`] they pass. Every literal is bound, never interpolated.

use sqlx::{Postgres, QueryBuilder};

use crate::query::{Column, ContactQuery, Predicate, SortField, SortOrder, Value};

/// Maps logical columns onto SQL expressions of one backend.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMap {
    /// Expression for each filterable column.
    pub column: fn(Column) -> &'static str,
    /// Expression for the creation timestamp.
    pub created_at: &'static str,
}

const fn is_text(column: Column) -> bool {
    matches!(column, Column::PrimaryEmail | Column::DisplayName)
}

/// Escape `LIKE` metacharacters so the needle matches literally.
#[must_use]
pub fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &Value) {
    match value {
        Value::Int(v) => qb.push_bind(*v),
        Value::Text(v) => qb.push_bind(v.clone()),
    };
}

const fn value_fits(column: Column, value: &Value) -> bool {
    match value {
        Value::Int(_) => !is_text(column),
        Value::Text(_) => is_text(column),
    }
}

/// Append the predicate as a boolean SQL expression.
///
/// Empty `IN` lists and empty disjunctions render as `FALSE`, so an empty
/// id filter can never widen a query. Type-mismatched comparisons also
/// render as `FALSE`, matching [`Predicate::matches`].
pub fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate, map: ColumnMap) {
    match predicate {
        Predicate::True => {
            qb.push("TRUE");
        }
        Predicate::False => {
            qb.push("FALSE");
        }
        Predicate::And(children) if children.is_empty() => {
            qb.push("TRUE");
        }
        Predicate::Or(children) if children.is_empty() => {
            qb.push("FALSE");
        }
        Predicate::Eq(column, value) => {
            if value_fits(*column, value) {
                qb.push((map.column)(*column)).push(" = ");
                push_value(qb, value);
            } else {
                qb.push("FALSE");
            }
        }
        Predicate::In(column, values) => {
            let values: Vec<&Value> = values.iter().filter(|v| value_fits(*column, v)).collect();
            if values.is_empty() {
                qb.push("FALSE");
                return;
            }
            qb.push((map.column)(*column)).push(" IN (");
            for (i, value) in values.into_iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, value);
            }
            qb.push(")");
        }
        Predicate::Contains(column, needle) => {
            if is_text(*column) {
                qb.push((map.column)(*column)).push(" ILIKE ");
                qb.push_bind(format!("%{}%", escape_like(needle)));
            } else {
                qb.push("FALSE");
            }
        }
        Predicate::And(children) => push_group(qb, children, " AND ", map),
        Predicate::Or(children) => push_group(qb, children, " OR ", map),
    }
}

fn push_group(
    qb: &mut QueryBuilder<'_, Postgres>,
    children: &[Predicate],
    joiner: &str,
    map: ColumnMap,
) {
    qb.push("(");
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        push_predicate(qb, child, map);
    }
    qb.push(")");
}

/// Append `ORDER BY`, `LIMIT` and `OFFSET` for the query.
///
/// Ties are broken by `id` ascending, matching [`ContactQuery::compare`].
pub fn push_order_and_page(qb: &mut QueryBuilder<'_, Postgres>, query: &ContactQuery, map: ColumnMap) {
    let sort = match query.sort {
        SortField::Name => (map.column)(Column::DisplayName),
        SortField::Email => (map.column)(Column::PrimaryEmail),
        SortField::Created => map.created_at,
    };
    let order = match query.order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    qb.push(" ORDER BY ")
        .push(sort)
        .push(" ")
        .push(order)
        .push(", ")
        .push((map.column)(Column::Id))
        .push(" ASC");

    if let Some(limit) = query.limit {
        qb.push(" LIMIT ").push_bind(i64::from(limit));
    }
    if query.offset > 0 {
        qb.push(" OFFSET ").push_bind(i64::from(query.offset));
    }
}
