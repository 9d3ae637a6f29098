//! Live schema snapshots.
//!
//! These describe what currently exists in a database, as opposed to the
//! entity descriptors which describe what should exist. They are built
//! fresh by every introspection call.

use serde::Serialize;

use crate::entity::{IndexDescriptor, UniqueDescriptor};
use crate::error::{Error, Result};

/// A column as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
    /// Column name.
    pub name: String,
    /// Declared native type, e.g. `INTEGER` or `VARCHAR(50)`.
    pub native_type: String,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Auto-incremented.
    pub autoincrement: bool,
    /// Covered by a single-column uniqueness constraint.
    pub unique: bool,
    /// Rejects NULL.
    pub not_null: bool,
    /// Default expression as stored by the database.
    pub default: Option<String>,
}

impl LiveColumn {
    /// NOT NULL, counting primary keys as NOT NULL.
    #[must_use]
    pub const fn effective_not_null(&self) -> bool {
        self.not_null || self.primary_key
    }

    /// Uniqueness, counting primary keys as unique.
    #[must_use]
    pub const fn effective_unique(&self) -> bool {
        self.unique || self.primary_key
    }
}

/// A live table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,
    /// Columns in table order.
    pub columns: Vec<LiveColumn>,
    /// Explicit, non-unique indices.
    pub indexes: Vec<IndexDescriptor>,
    /// Multi-column uniqueness constraints.
    pub uniques: Vec<UniqueDescriptor>,
}

impl TableDescriptor {
    /// Looks up a column by name, ignoring ASCII case.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&LiveColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Looks up an index by name, ignoring ASCII case.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexDescriptor> {
        self.indexes
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(name))
    }

    /// Whether the column appears in any index or uniqueness constraint.
    #[must_use]
    pub fn is_indexed(&self, column: &str) -> bool {
        self.indexes
            .iter()
            .flat_map(|i| i.columns.iter())
            .chain(self.uniques.iter().flat_map(|u| u.columns.iter()))
            .any(|c| c.eq_ignore_ascii_case(column))
    }
}

/// A live view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewDescriptor {
    /// View name.
    pub name: String,
    /// The view body (the `SELECT` following `AS`).
    pub definition: String,
}

impl ViewDescriptor {
    /// Builds a descriptor from a full `CREATE VIEW .. AS ..` statement.
    ///
    /// Text that does not look like a `CREATE VIEW` statement is kept as the
    /// body unchanged.
    #[must_use]
    pub fn from_create_sql(name: impl Into<String>, sql: &str) -> Self {
        Self {
            name: name.into(),
            definition: strip_view_prefix(sql).to_string(),
        }
    }
}

fn strip_view_prefix(sql: &str) -> &str {
    let trimmed = sql.trim();
    if !trimmed
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("CREATE"))
    {
        return trimmed;
    }
    let bytes = trimmed.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            // Quoted names and literals may contain anything, `AS` included.
            open @ (b'"' | b'`' | b'\'' | b'[') => {
                let close = if open == b'[' { b']' } else { open };
                i += 1;
                while i < bytes.len() && bytes[i] != close {
                    i += 1;
                }
                i += 1;
            }
            b'a' | b'A'
                if bytes.get(i + 1).is_some_and(|b| b.eq_ignore_ascii_case(&b's'))
                    && (i == 0 || !is_word_byte(bytes[i - 1]))
                    && !bytes.get(i + 2).is_some_and(|b| is_word_byte(*b)) =>
            {
                return trimmed[i + 2..].trim_start();
            }
            _ => i += 1,
        }
    }
    trimmed
}

const fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// A live schema object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SchemaDescriptor {
    /// A table.
    Table(TableDescriptor),
    /// A view.
    View(ViewDescriptor),
}

impl SchemaDescriptor {
    /// Object name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Table(table) => &table.name,
            Self::View(view) => &view.name,
        }
    }
}

/// Kind of a live schema object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// A table.
    Table,
    /// A view.
    View,
}

impl SchemaKind {
    /// Parses the kind reported by a catalog query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSchemaKind`] for anything but a table or view.
    pub fn parse(kind: &str) -> Result<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "table" | "base table" => Ok(Self::Table),
            "view" => Ok(Self::View),
            _ => Err(Error::UnknownSchemaKind(kind.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_prefix_is_stripped() {
        let view = ViewDescriptor::from_create_sql(
            "active_users",
            "CREATE VIEW \"active_users\" AS SELECT id FROM users WHERE active = 1",
        );
        assert_eq!(view.definition, "SELECT id FROM users WHERE active = 1");
    }

    #[test]
    fn test_view_prefix_ignores_names_containing_as() {
        let view = ViewDescriptor::from_create_sql(
            "aliases",
            "create view aliases as select alias from t",
        );
        assert_eq!(view.definition, "select alias from t");
    }

    #[test]
    fn test_view_prefix_skips_quoted_names() {
        let view = ViewDescriptor::from_create_sql(
            "bought as gift",
            "CREATE VIEW \"bought as gift\" AS SELECT id FROM orders WHERE gift = 1",
        );
        assert_eq!(view.definition, "SELECT id FROM orders WHERE gift = 1");

        let view = ViewDescriptor::from_create_sql(
            "x as y",
            "CREATE VIEW IF NOT EXISTS [x as y] (id) as SELECT 1",
        );
        assert_eq!(view.definition, "SELECT 1");

        let view = ViewDescriptor::from_create_sql("a as b", "CREATE VIEW `a as b` AS SELECT 2");
        assert_eq!(view.definition, "SELECT 2");
    }

    #[test]
    fn test_plain_body_is_kept() {
        let view = ViewDescriptor::from_create_sql("v", "SELECT 1");
        assert_eq!(view.definition, "SELECT 1");
    }

    #[test]
    fn test_schema_kind_parse() {
        assert_eq!(SchemaKind::parse("table").unwrap(), SchemaKind::Table);
        assert_eq!(SchemaKind::parse("BASE TABLE").unwrap(), SchemaKind::Table);
        assert_eq!(SchemaKind::parse("view").unwrap(), SchemaKind::View);
        assert_eq!(
            SchemaKind::parse("index"),
            Err(Error::UnknownSchemaKind(String::from("index")))
        );
    }

    #[test]
    fn test_schema_descriptor_serializes_with_kind_tag() {
        let descriptor = SchemaDescriptor::View(ViewDescriptor {
            name: String::from("v"),
            definition: String::from("SELECT 1"),
        });
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["kind"], "view");
        assert_eq!(json["definition"], "SELECT 1");
    }

    #[test]
    fn test_is_indexed() {
        let table = TableDescriptor {
            name: String::from("t"),
            columns: Vec::new(),
            indexes: vec![IndexDescriptor {
                name: String::from("idx"),
                columns: vec![String::from("a")],
            }],
            uniques: vec![UniqueDescriptor {
                name: None,
                columns: vec![String::from("b"), String::from("c")],
            }],
        };
        assert!(table.is_indexed("A"));
        assert!(table.is_indexed("c"));
        assert!(!table.is_indexed("d"));
    }
}
