//! PostgreSQL dialect.

use super::{base_type, Dialect};
use crate::entity::ColumnDescriptor;
use crate::types::CanonicalType;
use crate::value::DefaultValue;

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn parameter_marker(&self, index: usize) -> String {
        format!("${index}")
    }

    fn native_type(&self, ty: &CanonicalType, size: Option<u32>) -> String {
        match ty {
            CanonicalType::Bool => "BOOLEAN".to_string(),
            CanonicalType::I8 | CanonicalType::I16 | CanonicalType::U8 => "SMALLINT".to_string(),
            CanonicalType::I32 | CanonicalType::U16 => "INTEGER".to_string(),
            CanonicalType::I64 | CanonicalType::U32 | CanonicalType::U64 => "BIGINT".to_string(),
            CanonicalType::F32 => "REAL".to_string(),
            CanonicalType::F64 => "DOUBLE PRECISION".to_string(),
            CanonicalType::Decimal => "NUMERIC".to_string(),
            CanonicalType::Text | CanonicalType::Custom(_) => match size {
                Some(n) => format!("VARCHAR({n})"),
                None => "TEXT".to_string(),
            },
            CanonicalType::Char => "CHAR(1)".to_string(),
            CanonicalType::Bytes => "BYTEA".to_string(),
            CanonicalType::DateTime => "TIMESTAMP".to_string(),
            CanonicalType::Date => "DATE".to_string(),
            CanonicalType::Time => "TIME".to_string(),
            CanonicalType::Uuid => "UUID".to_string(),
        }
    }

    fn normalize_type(&self, native: &str) -> String {
        let base = base_type(native);
        let normalized = match base.as_str() {
            "CHARACTER VARYING" | "VARCHAR" | "TEXT" => "TEXT",
            "INT" | "INT4" | "SERIAL" | "SERIAL4" => "INTEGER",
            "INT8" | "BIGSERIAL" | "SERIAL8" => "BIGINT",
            "INT2" | "SMALLSERIAL" => "SMALLINT",
            "FLOAT8" | "FLOAT" => "DOUBLE PRECISION",
            "FLOAT4" => "REAL",
            "BOOL" => "BOOLEAN",
            "DECIMAL" => "NUMERIC",
            "CHARACTER" | "BPCHAR" => "CHAR",
            "TIMESTAMP WITHOUT TIME ZONE" => "TIMESTAMP",
            "TIME WITHOUT TIME ZONE" => "TIME",
            other => return other.to_string(),
        };
        normalized.to_string()
    }

    fn render_default(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::Bool(true) => "TRUE".to_string(),
            DefaultValue::Bool(false) => "FALSE".to_string(),
            other => other.to_sql(),
        }
    }

    fn column_definition(&self, column: &ColumnDescriptor) -> String {
        if column.primary_key && column.autoincrement {
            let serial = match column.canonical {
                CanonicalType::I64 | CanonicalType::U32 | CanonicalType::U64 => "BIGSERIAL",
                CanonicalType::I8 | CanonicalType::I16 | CanonicalType::U8 => "SMALLSERIAL",
                _ => "SERIAL",
            };
            return format!("{} {serial} PRIMARY KEY", self.quote_identifier(&column.name));
        }

        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.native_type(&column.canonical, column.size)
        );
        if column.primary_key {
            sql.push_str(" PRIMARY KEY");
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

    fn alter_column(&self, table: &str, column: &ColumnDescriptor) -> Option<Vec<String>> {
        let table = self.quote_identifier(table);
        let name = self.quote_identifier(&column.name);
        let native = self.native_type(&column.canonical, column.size);
        let nullability = if column.effective_not_null() {
            "SET NOT NULL"
        } else {
            "DROP NOT NULL"
        };
        Some(vec![
            format!("ALTER TABLE {table} ALTER COLUMN {name} TYPE {native} USING {name}::{native}"),
            format!("ALTER TABLE {table} ALTER COLUMN {name} {nullability}"),
        ])
    }

    fn truncate(&self, table: &str, reset_sequence: bool) -> Vec<String> {
        let mut sql = format!("TRUNCATE TABLE {}", self.quote_identifier(table));
        if reset_sequence {
            sql.push_str(" RESTART IDENTITY");
        }
        vec![sql]
    }

    fn table_exists_query(&self) -> String {
        String::from(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
             AND table_name = $1",
        )
    }

    fn object_kind_query(&self) -> String {
        String::from(
            "SELECT t.table_type, v.view_definition FROM information_schema.tables t \
             LEFT JOIN information_schema.views v \
             ON v.table_schema = t.table_schema AND v.table_name = t.table_name \
             WHERE t.table_schema = current_schema() AND t.table_name = $1",
        )
    }
}
