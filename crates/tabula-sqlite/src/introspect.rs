//! Live schema introspection.
//!
//! Snapshots are read fresh on every call from `sqlite_master` and the
//! `table_info`, `index_list` and `index_info` pragmas.

use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use tabula_core::dialect::{Dialect, SqliteDialect};
use tabula_core::entity::{IndexDescriptor, UniqueDescriptor};
use tabula_core::schema::{LiveColumn, SchemaKind};
use tabula_core::{SchemaDescriptor, TableDescriptor, ViewDescriptor};
use tracing::debug;

use crate::error::Result;

/// Whether a table named `name` exists.
pub(crate) async fn table_exists(
    conn: &mut SqliteConnection,
    dialect: &SqliteDialect,
    name: &str,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(&dialect.table_exists_query())
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

/// Snapshot of the table or view named `name`, or `None` when nothing by
/// that name exists.
pub(crate) async fn describe(
    conn: &mut SqliteConnection,
    dialect: &SqliteDialect,
    name: &str,
) -> Result<Option<SchemaDescriptor>> {
    let row = sqlx::query(&dialect.object_kind_query())
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let kind: String = row.try_get(0)?;
    let sql: Option<String> = row.try_get(1)?;
    debug!(name = %name, kind = %kind, "Introspecting schema object");

    let descriptor = match SchemaKind::parse(&kind)? {
        SchemaKind::Table => {
            SchemaDescriptor::Table(describe_table(conn, dialect, name, sql.as_deref()).await?)
        }
        SchemaKind::View => {
            SchemaDescriptor::View(ViewDescriptor::from_create_sql(name, sql.as_deref().unwrap_or_default()))
        }
    };
    Ok(Some(descriptor))
}

async fn describe_table(
    conn: &mut SqliteConnection,
    dialect: &SqliteDialect,
    name: &str,
    create_sql: Option<&str>,
) -> Result<TableDescriptor> {
    let quoted = dialect.quote_identifier(name);
    let autoincrement = create_sql.is_some_and(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT"));

    let rows = sqlx::query(&format!("PRAGMA table_info({quoted})"))
        .fetch_all(&mut *conn)
        .await?;
    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let key_position: i64 = row.try_get("pk")?;
        let not_null: i64 = row.try_get("notnull")?;
        columns.push(LiveColumn {
            name: row.try_get("name")?,
            native_type: row.try_get("type")?,
            primary_key: key_position > 0,
            autoincrement: false,
            unique: false,
            not_null: not_null != 0 || key_position > 0,
            default: row.try_get("dflt_value")?,
        });
    }

    // AUTOINCREMENT is only legal on a single INTEGER PRIMARY KEY.
    let keys: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.primary_key)
        .map(|(i, _)| i)
        .collect();
    if autoincrement && keys.len() == 1 {
        columns[keys[0]].autoincrement = true;
    }

    let mut indexes = Vec::new();
    let mut uniques = Vec::new();
    let index_rows = sqlx::query(&format!("PRAGMA index_list({quoted})"))
        .fetch_all(&mut *conn)
        .await?;
    for row in &index_rows {
        let index_name: String = row.try_get("name")?;
        let unique: i64 = row.try_get("unique")?;
        let origin: String = row.try_get("origin")?;
        if origin == "pk" {
            continue;
        }

        let info = sqlx::query(&format!(
            "PRAGMA index_info({})",
            dialect.quote_identifier(&index_name)
        ))
        .fetch_all(&mut *conn)
        .await?;
        let mut members: Vec<(i64, String)> = info
            .iter()
            .map(|r| -> std::result::Result<(i64, String), sqlx::Error> {
                Ok((r.try_get("seqno")?, r.try_get("name")?))
            })
            .collect::<std::result::Result<_, _>>()?;
        members.sort_by_key(|(seqno, _)| *seqno);
        let members: Vec<String> = members.into_iter().map(|(_, name)| name).collect();

        if unique == 0 {
            indexes.push(IndexDescriptor {
                name: index_name,
                columns: members,
            });
        } else if let [only] = members.as_slice() {
            if let Some(column) = columns.iter_mut().find(|c| c.name.eq_ignore_ascii_case(only)) {
                column.unique = true;
            }
        } else {
            // Constraint-backed indices carry generated names.
            let name = (origin == "c").then_some(index_name);
            uniques.push(UniqueDescriptor {
                name,
                columns: members,
            });
        }
    }
    indexes.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(TableDescriptor {
        name: name.to_string(),
        columns,
        indexes,
        uniques,
    })
}
