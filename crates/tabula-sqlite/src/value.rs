//! Conversion between [`SqlValue`] and sqlx's SQLite types.

use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tabula_core::{SqlValue, Statement};

/// Builds a sqlx query with every parameter of `statement` bound in order.
pub(crate) fn bind_statement(statement: &Statement) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    let mut query = sqlx::query(&statement.sql);
    for value in &statement.params {
        query = match value {
            SqlValue::Null => query.bind(Option::<i64>::None),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Blob(b) => query.bind(b.as_slice()),
            SqlValue::Timestamp(t) => query.bind(*t),
        };
    }
    query
}

/// Decodes one column by the storage class of the value it holds.
///
/// SQLite types values, not columns, so the same column can yield an
/// `Int` in one row and `Text` in the next.
///
/// # Errors
///
/// Returns the driver error for an out-of-range index or a value that
/// cannot be decoded.
pub fn decode_column(row: &SqliteRow, index: usize) -> Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage = raw.type_info().name().to_string();
    match storage.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(index).map(SqlValue::Int),
        "REAL" => row.try_get::<f64, _>(index).map(SqlValue::Float),
        "BLOB" => row.try_get::<Vec<u8>, _>(index).map(SqlValue::Blob),
        _ => row.try_get::<String, _>(index).map(SqlValue::Text),
    }
}

/// Decodes every column of a row, keyed by column name.
///
/// # Errors
///
/// Same as [`decode_column`].
pub fn decode_row(row: &SqliteRow) -> Result<Vec<(String, SqlValue)>, sqlx::Error> {
    row.columns()
        .iter()
        .map(|column| Ok((column.name().to_string(), decode_column(row, column.ordinal())?)))
        .collect()
}
