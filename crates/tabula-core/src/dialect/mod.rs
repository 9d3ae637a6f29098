//! SQL dialect support.
//!
//! Different databases disagree on quoting, parameter markers, native
//! types, paging and DDL. Every statement this crate renders goes through
//! one [`Dialect`], and identical input always renders identical text for a
//! given dialect.

mod mssql;
mod postgres;
mod sqlite;

use std::fmt;

pub use mssql::MsSqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::entity::{ColumnDescriptor, EntityDescriptor, IndexDescriptor, UniqueDescriptor};
use crate::migration::SchemaDiff;
use crate::types::CanonicalType;
use crate::value::{DefaultValue, SqlValue};

/// Trait for dialect-specific syntax, types and DDL.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Opening and closing identifier quote characters.
    fn quote_chars(&self) -> (char, char) {
        ('"', '"')
    }

    /// Quotes an identifier, doubling any closing quote inside it.
    fn quote_identifier(&self, name: &str) -> String {
        let (open, close) = self.quote_chars();
        let escaped = name.replace(close, &format!("{close}{close}"));
        format!("{open}{escaped}{close}")
    }

    /// Marker for the parameter at 1-based `index`.
    fn parameter_marker(&self, _index: usize) -> String {
        String::from("?")
    }

    /// Maps a canonical type (with optional size) to a native type.
    fn native_type(&self, ty: &CanonicalType, size: Option<u32>) -> String;

    /// Reduces a native type spelling to a comparable form.
    fn normalize_type(&self, native: &str) -> String {
        base_type(native)
    }

    /// Whether two native type spellings denote the same storage.
    fn types_equivalent(&self, a: &str, b: &str) -> bool {
        self.normalize_type(a) == self.normalize_type(b)
    }

    /// Converts a value to the representation the driver expects.
    fn convert_value(&self, value: SqlValue) -> SqlValue {
        value
    }

    /// Keyword appended to an auto-incremented primary key.
    fn autoincrement_keyword(&self) -> &'static str {
        ""
    }

    /// Renders a default value.
    fn render_default(&self, default: &DefaultValue) -> String {
        default.to_sql()
    }

    /// Literal used to fill a NOT NULL column that has no value yet: the
    /// declared default, or else the type's zero value.
    fn fill_value(&self, column: &ColumnDescriptor) -> String {
        match &column.default {
            Some(default) => self.render_default(default),
            None => self
                .convert_value(column.canonical.zero_value())
                .to_sql_inline(),
        }
    }

    /// Paging clause appended after `ORDER BY` (empty when not paging).
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, _has_order: bool) -> String {
        match (limit, offset) {
            (None, None) => String::new(),
            (Some(limit), None) => format!("LIMIT {limit}"),
            (None, Some(offset)) => format!("OFFSET {offset}"),
            (Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
        }
    }

    /// Generates SQL for a column definition.
    fn column_definition(&self, column: &ColumnDescriptor) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.native_type(&column.canonical, column.size)
        );

        if column.primary_key {
            sql.push_str(" PRIMARY KEY");
            if column.autoincrement {
                sql.push_str(self.autoincrement_keyword());
            }
        } else {
            if column.not_null {
                sql.push_str(" NOT NULL");
            }
            if column.unique {
                sql.push_str(" UNIQUE");
            }
        }

        if let Some(ref default) = column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.render_default(default));
        }

        sql
    }

    /// Generates a table-level uniqueness constraint.
    fn unique_constraint(&self, table: &str, unique: &UniqueDescriptor) -> String {
        format!(
            "CONSTRAINT {} UNIQUE ({})",
            self.quote_identifier(&unique_name(table, unique)),
            self.column_list(&unique.columns)
        )
    }

    /// Comma-separated, quoted column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Generates SQL for CREATE TABLE, including uniqueness constraints.
    fn create_table(&self, entity: &EntityDescriptor) -> String {
        let mut sql = String::from("CREATE TABLE ");
        sql.push_str(&self.quote_identifier(&entity.name));
        sql.push_str(" (\n");

        let mut definitions: Vec<String> = entity
            .columns
            .iter()
            .map(|c| format!("    {}", self.column_definition(c)))
            .collect();
        definitions.extend(
            entity
                .uniques
                .iter()
                .map(|u| format!("    {}", self.unique_constraint(&entity.name, u))),
        );
        sql.push_str(&definitions.join(",\n"));

        sql.push_str("\n)");
        sql
    }

    /// Generates SQL for CREATE INDEX.
    fn create_index(&self, table: &str, index: &IndexDescriptor) -> String {
        format!(
            "CREATE INDEX {} ON {} ({})",
            self.quote_identifier(&index.name),
            self.quote_identifier(table),
            self.column_list(&index.columns)
        )
    }

    /// Generates SQL for DROP INDEX.
    fn drop_index(&self, _table: &str, name: &str) -> String {
        format!("DROP INDEX IF EXISTS {}", self.quote_identifier(name))
    }

    /// Generates SQL adding a uniqueness constraint to an existing table.
    fn add_unique(&self, table: &str, unique: &UniqueDescriptor) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.unique_constraint(table, unique)
        )
    }

    /// Generates SQL for ADD COLUMN.
    ///
    /// A NOT NULL column without a declared default gets its fill value as
    /// default so existing rows stay valid.
    fn add_column(&self, table: &str, column: &ColumnDescriptor) -> String {
        let mut column = column.clone();
        if column.effective_not_null() && column.default.is_none() {
            column.default = Some(DefaultValue::Expression(self.fill_value(&column)));
        }
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(&column)
        )
    }

    /// Generates SQL for DROP COLUMN.
    fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Generates SQL changing a column's type and nullability in place.
    ///
    /// `None` means the dialect cannot alter columns and the table must be
    /// recreated.
    fn alter_column(&self, _table: &str, _column: &ColumnDescriptor) -> Option<Vec<String>> {
        None
    }

    /// Generates SQL for RENAME TABLE.
    fn rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    /// Statements moving a table aside before it is rebuilt under its
    /// original name.
    ///
    /// Dialects whose rename rewrites dependent views override this, so
    /// that those views resolve to the rebuilt table.
    fn rename_for_rebuild(&self, from: &str, to: &str) -> Vec<String> {
        vec![self.rename_table(from, to)]
    }

    /// Generates SQL for DROP TABLE.
    fn drop_table(&self, name: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(name))
    }

    /// Generates SQL for CREATE VIEW.
    fn create_view(&self, name: &str, definition: &str) -> String {
        format!(
            "CREATE VIEW {} AS {}",
            self.quote_identifier(name),
            definition.trim()
        )
    }

    /// Generates SQL for DROP VIEW.
    fn drop_view(&self, name: &str) -> String {
        format!("DROP VIEW IF EXISTS {}", self.quote_identifier(name))
    }

    /// Statements emptying a table, optionally resetting its sequence.
    fn truncate(&self, table: &str, reset_sequence: bool) -> Vec<String>;

    /// Query counting tables with the name bound as the only parameter.
    fn table_exists_query(&self) -> String;

    /// Query returning `(kind, definition)` for the object named by the only
    /// parameter.
    fn object_kind_query(&self) -> String;

    /// Whether the changes in `diff` can only be applied by rebuilding the
    /// table.
    ///
    /// Key, autoincrement or uniqueness changes always need a rebuild, as do
    /// altered columns the dialect cannot alter in place. Obsolete
    /// multi-column uniqueness constraints are left in place.
    fn requires_recreate(&self, diff: &SchemaDiff) -> bool {
        diff.missing().any(|c| c.primary_key || c.autoincrement)
            || diff.altered().any(|(model, live)| {
                model.primary_key != live.primary_key
                    || model.autoincrement != live.autoincrement
                    || model.effective_unique() != live.effective_unique()
                    || self.alter_column(&diff.table, model).is_none()
            })
    }
}

/// Upper-cased type name without size arguments: `varchar(40)` becomes
/// `VARCHAR`.
#[must_use]
pub fn base_type(native: &str) -> String {
    let head = native.split('(').next().unwrap_or(native);
    head.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

/// Name used for a uniqueness constraint: the group name, or one derived
/// from the table and columns.
#[must_use]
pub fn unique_name(table: &str, unique: &UniqueDescriptor) -> String {
    match &unique.name {
        Some(name) => name.clone(),
        None => format!("uq_{table}_{}", unique.columns.join("_")),
    }
}
