//! SQL Server dialect.

use super::{base_type, Dialect};
use crate::entity::ColumnDescriptor;
use crate::types::CanonicalType;
use crate::value::SqlValue;

/// SQL Server dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsSqlDialect;

impl MsSqlDialect {
    /// Creates a new SQL Server dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for MsSqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn quote_chars(&self) -> (char, char) {
        ('[', ']')
    }

    fn parameter_marker(&self, index: usize) -> String {
        format!("@p{index}")
    }

    fn native_type(&self, ty: &CanonicalType, size: Option<u32>) -> String {
        match ty {
            CanonicalType::Bool => "BIT".to_string(),
            CanonicalType::U8 => "TINYINT".to_string(),
            CanonicalType::I8 | CanonicalType::I16 => "SMALLINT".to_string(),
            CanonicalType::I32 | CanonicalType::U16 => "INT".to_string(),
            CanonicalType::I64 | CanonicalType::U32 | CanonicalType::U64 => "BIGINT".to_string(),
            CanonicalType::F32 => "REAL".to_string(),
            CanonicalType::F64 => "FLOAT".to_string(),
            CanonicalType::Decimal => "DECIMAL(18, 6)".to_string(),
            CanonicalType::Text | CanonicalType::Custom(_) => match size {
                Some(n) => format!("NVARCHAR({n})"),
                None => "NVARCHAR(MAX)".to_string(),
            },
            CanonicalType::Char => "NCHAR(1)".to_string(),
            CanonicalType::Bytes => "VARBINARY(MAX)".to_string(),
            CanonicalType::DateTime => "DATETIME2".to_string(),
            CanonicalType::Date => "DATE".to_string(),
            CanonicalType::Time => "TIME".to_string(),
            CanonicalType::Uuid => "UNIQUEIDENTIFIER".to_string(),
        }
    }

    fn normalize_type(&self, native: &str) -> String {
        let base = base_type(native);
        let normalized = match base.as_str() {
            "NVARCHAR" | "VARCHAR" | "NTEXT" | "TEXT" => "NVARCHAR",
            "NCHAR" | "CHAR" => "NCHAR",
            "INTEGER" => "INT",
            "DOUBLE PRECISION" => "FLOAT",
            "DATETIME" => "DATETIME2",
            "NUMERIC" => "DECIMAL",
            other => return other.to_string(),
        };
        normalized.to_string()
    }

    fn convert_value(&self, value: SqlValue) -> SqlValue {
        match value {
            SqlValue::Bool(b) => SqlValue::Int(i64::from(b)),
            other => other,
        }
    }

    /// `OFFSET .. FETCH` needs an `ORDER BY`; one is synthesized when the
    /// query has none.
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, has_order: bool) -> String {
        if limit.is_none() && offset.is_none() {
            return String::new();
        }
        let mut sql = String::new();
        if !has_order {
            sql.push_str("ORDER BY (SELECT NULL) ");
        }
        sql.push_str(&format!("OFFSET {} ROWS", offset.unwrap_or(0)));
        if let Some(limit) = limit {
            sql.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
        }
        sql
    }

    fn column_definition(&self, column: &ColumnDescriptor) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.native_type(&column.canonical, column.size)
        );
        if column.effective_not_null() {
            sql.push_str(" NOT NULL");
        } else {
            sql.push_str(" NULL");
        }
        if column.autoincrement {
            sql.push_str(" IDENTITY(1,1)");
        }
        if column.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if column.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(ref default) = column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.render_default(default));
        }
        sql
    }

    fn add_column(&self, table: &str, column: &ColumnDescriptor) -> String {
        let mut column = column.clone();
        if column.effective_not_null() && column.default.is_none() {
            column.default = Some(crate::value::DefaultValue::Expression(
                self.fill_value(&column),
            ));
        }
        format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.column_definition(&column)
        )
    }

    fn drop_index(&self, table: &str, name: &str) -> String {
        format!(
            "DROP INDEX IF EXISTS {} ON {}",
            self.quote_identifier(name),
            self.quote_identifier(table)
        )
    }

    fn alter_column(&self, table: &str, column: &ColumnDescriptor) -> Option<Vec<String>> {
        let nullability = if column.effective_not_null() {
            "NOT NULL"
        } else {
            "NULL"
        };
        Some(vec![format!(
            "ALTER TABLE {} ALTER COLUMN {} {} {nullability}",
            self.quote_identifier(table),
            self.quote_identifier(&column.name),
            self.native_type(&column.canonical, column.size)
        )])
    }

    fn rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "EXEC sp_rename {}, {}",
            SqlValue::Text(from.to_string()).to_sql_inline(),
            SqlValue::Text(to.to_string()).to_sql_inline()
        )
    }

    fn truncate(&self, table: &str, reset_sequence: bool) -> Vec<String> {
        // TRUNCATE reseeds IDENTITY columns, DELETE keeps them.
        if reset_sequence {
            vec![format!("TRUNCATE TABLE {}", self.quote_identifier(table))]
        } else {
            vec![format!("DELETE FROM {}", self.quote_identifier(table))]
        }
    }

    fn table_exists_query(&self) -> String {
        String::from(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_NAME = @p1",
        )
    }

    fn object_kind_query(&self) -> String {
        String::from(
            "SELECT CASE o.type WHEN 'U' THEN 'table' WHEN 'V' THEN 'view' ELSE o.type_desc END, \
             OBJECT_DEFINITION(o.object_id) FROM sys.objects o WHERE o.name = @p1",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityDescriptor, EntityMapping, FieldMapping};

    #[test]
    fn test_bracket_quoting() {
        let dialect = MsSqlDialect::new();
        assert_eq!(dialect.quote_identifier("order"), "[order]");
        assert_eq!(dialect.quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn test_offset_fetch_synthesizes_order() {
        let dialect = MsSqlDialect::new();
        assert_eq!(
            dialect.limit_offset(Some(10), Some(20), false),
            "ORDER BY (SELECT NULL) OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"
        );
        assert_eq!(
            dialect.limit_offset(Some(5), None, true),
            "OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"
        );
        assert_eq!(dialect.limit_offset(None, None, false), "");
    }

    #[test]
    fn test_identity_column() {
        let desc = EntityDescriptor::build(
            &EntityMapping::table("orders")
                .field(FieldMapping::new("id", "i32").primary_key().autoincrement())
                .field(FieldMapping::new("note", "Option<String>").size(200)),
        )
        .unwrap();
        let sql = MsSqlDialect::new().create_table(&desc);
        assert!(sql.contains("[id] INT NOT NULL IDENTITY(1,1) PRIMARY KEY"));
        assert!(sql.contains("[note] NVARCHAR(200) NULL"));
    }

    #[test]
    fn test_types_equivalent() {
        let dialect = MsSqlDialect::new();
        assert!(dialect.types_equivalent("NVARCHAR(MAX)", "varchar(50)"));
        assert!(dialect.types_equivalent("INT", "integer"));
    }

    #[test]
    fn test_rename_uses_sp_rename() {
        assert_eq!(
            MsSqlDialect::new().rename_table("a", "b"),
            "EXEC sp_rename 'a', 'b'"
        );
    }
}
