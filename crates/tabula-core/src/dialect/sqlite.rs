//! SQLite dialect.

use super::Dialect;
use crate::entity::UniqueDescriptor;
use crate::migration::SchemaDiff;
use crate::types::CanonicalType;
use crate::value::{DefaultValue, SqlValue};

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn native_type(&self, ty: &CanonicalType, _size: Option<u32>) -> String {
        // SQLite has dynamic typing with type affinity
        match ty {
            CanonicalType::Bool
            | CanonicalType::I8
            | CanonicalType::I16
            | CanonicalType::I32
            | CanonicalType::I64
            | CanonicalType::U8
            | CanonicalType::U16
            | CanonicalType::U32
            | CanonicalType::U64 => "INTEGER".to_string(),
            CanonicalType::F32 | CanonicalType::F64 | CanonicalType::Decimal => "REAL".to_string(),
            CanonicalType::Bytes => "BLOB".to_string(),
            CanonicalType::Text
            | CanonicalType::Char
            | CanonicalType::DateTime
            | CanonicalType::Date
            | CanonicalType::Time
            | CanonicalType::Uuid
            | CanonicalType::Custom(_) => "TEXT".to_string(),
        }
    }

    /// Column affinity, following SQLite's own rules for declared types.
    fn normalize_type(&self, native: &str) -> String {
        let upper = native.to_ascii_uppercase();
        let affinity = if upper.contains("INT") {
            "INTEGER"
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            "TEXT"
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            "BLOB"
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            "REAL"
        } else {
            "NUMERIC"
        };
        affinity.to_string()
    }

    fn convert_value(&self, value: SqlValue) -> SqlValue {
        match value {
            SqlValue::Bool(b) => SqlValue::Int(i64::from(b)),
            other => other,
        }
    }

    fn autoincrement_keyword(&self) -> &'static str {
        " AUTOINCREMENT"
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, _has_order: bool) -> String {
        match (limit, offset) {
            (None, None) => String::new(),
            (Some(limit), None) => format!("LIMIT {limit}"),
            // SQLite only accepts OFFSET after a LIMIT.
            (None, Some(offset)) => format!("LIMIT -1 OFFSET {offset}"),
            (Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
        }
    }

    fn add_unique(&self, table: &str, unique: &UniqueDescriptor) -> String {
        format!(
            "CREATE UNIQUE INDEX {} ON {} ({})",
            self.quote_identifier(&super::unique_name(table, unique)),
            self.quote_identifier(table),
            self.column_list(&unique.columns)
        )
    }

    /// A plain rename rewrites dependent views to the new name; legacy mode
    /// leaves them pointing at the table being rebuilt.
    fn rename_for_rebuild(&self, from: &str, to: &str) -> Vec<String> {
        vec![
            String::from("PRAGMA legacy_alter_table = ON"),
            self.rename_table(from, to),
            String::from("PRAGMA legacy_alter_table = OFF"),
        ]
    }

    fn truncate(&self, table: &str, reset_sequence: bool) -> Vec<String> {
        let mut statements = vec![format!("DELETE FROM {}", self.quote_identifier(table))];
        if reset_sequence {
            statements.push(format!(
                "DELETE FROM sqlite_sequence WHERE name = {}",
                SqlValue::Text(table.to_string()).to_sql_inline()
            ));
        }
        statements
    }

    fn table_exists_query(&self) -> String {
        String::from("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
    }

    fn object_kind_query(&self) -> String {
        String::from("SELECT type, sql FROM sqlite_master WHERE name = ?")
    }

    /// SQLite cannot alter columns or add constraints in place, and refuses
    /// to drop key, unique or indexed columns or to add key, unique or
    /// non-constant-default columns.
    fn requires_recreate(&self, diff: &SchemaDiff) -> bool {
        diff.altered().next().is_some()
            || !diff.missing_uniques.is_empty()
            || diff.missing().any(|c| {
                c.primary_key
                    || c.unique
                    || matches!(c.default, Some(DefaultValue::Expression(_)))
            })
            || diff
                .obsolete()
                .any(|c| c.primary_key || c.unique || diff.live.is_indexed(&c.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ColumnDescriptor, EntityDescriptor, EntityMapping, FieldMapping};

    fn users() -> EntityDescriptor {
        EntityDescriptor::build(
            &EntityMapping::table("users")
                .field(FieldMapping::new("id", "i64").primary_key().autoincrement())
                .field(FieldMapping::new("username", "String").not_null().unique())
                .field(FieldMapping::new("active", "bool").default(DefaultValue::Bool(true)))
                .field(FieldMapping::new("org", "Option<i32>").unique_named("org_user"))
                .field(FieldMapping::new("login", "Option<String>").unique_named("org_user")),
        )
        .unwrap()
    }

    #[test]
    fn test_sqlite_data_types() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.native_type(&CanonicalType::I32, None), "INTEGER");
        assert_eq!(dialect.native_type(&CanonicalType::Bool, None), "INTEGER");
        assert_eq!(dialect.native_type(&CanonicalType::Text, Some(50)), "TEXT");
        assert_eq!(dialect.native_type(&CanonicalType::Bytes, None), "BLOB");
        assert_eq!(dialect.native_type(&CanonicalType::F64, None), "REAL");
        assert_eq!(dialect.native_type(&CanonicalType::DateTime, None), "TEXT");
    }

    #[test]
    fn test_type_affinity_equivalence() {
        let dialect = SqliteDialect::new();
        assert!(dialect.types_equivalent("TEXT", "VARCHAR(255)"));
        assert!(dialect.types_equivalent("INTEGER", "bigint"));
        assert!(dialect.types_equivalent("REAL", "DOUBLE PRECISION"));
        assert!(!dialect.types_equivalent("INTEGER", "TEXT"));
    }

    #[test]
    fn test_create_table_sql() {
        let sql = SqliteDialect::new().create_table(&users());
        assert!(sql.starts_with("CREATE TABLE \"users\" (\n"));
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("\"username\" TEXT NOT NULL UNIQUE"));
        assert!(sql.contains("\"active\" INTEGER NOT NULL DEFAULT 1"));
        assert!(sql.contains("CONSTRAINT \"org_user\" UNIQUE (\"org\", \"login\")"));
    }

    #[test]
    fn test_add_not_null_column_gets_fill_default() {
        let dialect = SqliteDialect::new();
        let mut column = ColumnDescriptor::new("field4", CanonicalType::I32);
        column.not_null = true;
        assert_eq!(
            dialect.add_column("t", &column),
            "ALTER TABLE \"t\" ADD COLUMN \"field4\" INTEGER NOT NULL DEFAULT 0"
        );

        let mut flag = ColumnDescriptor::new("flag", CanonicalType::Bool);
        flag.not_null = true;
        assert_eq!(
            dialect.add_column("t", &flag),
            "ALTER TABLE \"t\" ADD COLUMN \"flag\" INTEGER NOT NULL DEFAULT 0"
        );
    }

    #[test]
    fn test_paging() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.limit_offset(Some(10), Some(20), false), "LIMIT 10 OFFSET 20");
        assert_eq!(dialect.limit_offset(None, Some(5), true), "LIMIT -1 OFFSET 5");
        assert_eq!(dialect.limit_offset(None, None, true), "");
    }

    #[test]
    fn test_truncate() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.truncate("logs", false), vec!["DELETE FROM \"logs\""]);
        assert_eq!(
            dialect.truncate("o'logs", true),
            vec![
                "DELETE FROM \"o'logs\"".to_string(),
                "DELETE FROM sqlite_sequence WHERE name = 'o''logs'".to_string(),
            ]
        );
    }

    #[test]
    fn test_drop_statements() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.drop_table("t"), "DROP TABLE IF EXISTS \"t\"");
        assert_eq!(dialect.drop_view("v"), "DROP VIEW IF EXISTS \"v\"");
        assert_eq!(dialect.drop_index("t", "idx"), "DROP INDEX IF EXISTS \"idx\"");
        assert_eq!(
            dialect.rename_table("a", "b"),
            "ALTER TABLE \"a\" RENAME TO \"b\""
        );
    }
}
