//! Canonical descriptors built from a mapping description.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::CanonicalType;
use crate::value::DefaultValue;

use super::mapping::{EntityKind, EntityMapping, FieldMapping, GroupRef};

/// Canonical description of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Rust field the column is read from.
    pub field: String,
    /// Column name.
    pub name: String,
    /// Canonical type.
    pub canonical: CanonicalType,
    /// Optional size (`VARCHAR(n)`).
    pub size: Option<u32>,
    /// Primary key flag.
    pub primary_key: bool,
    /// Autoincrement flag.
    pub autoincrement: bool,
    /// Column-level uniqueness.
    pub unique: bool,
    /// NOT NULL flag.
    pub not_null: bool,
    /// Declared default, never set for primary keys.
    pub default: Option<DefaultValue>,
}

impl ColumnDescriptor {
    /// Returns a column with the given name and type and no constraints.
    #[must_use]
    pub fn new(name: impl Into<String>, canonical: CanonicalType) -> Self {
        let name = name.into();
        Self {
            field: name.clone(),
            name,
            canonical,
            size: None,
            primary_key: false,
            autoincrement: false,
            unique: false,
            not_null: false,
            default: None,
        }
    }

    fn from_field(field: &FieldMapping) -> Self {
        let name = field
            .column
            .clone()
            .unwrap_or_else(|| field.field.to_lowercase());
        let (declared, nullable) = CanonicalType::from_rust_type(&field.rust_type);
        let canonical = match &field.enum_repr {
            Some(repr) => CanonicalType::from_rust_type(repr).0,
            None => declared,
        };
        let not_null = field
            .not_null
            .unwrap_or(!nullable && canonical.is_value_type());
        let default = if field.primary_key {
            None
        } else {
            field.default.clone()
        };

        Self {
            field: field.field.clone(),
            name,
            canonical,
            size: field.size,
            primary_key: field.primary_key,
            autoincrement: field.autoincrement,
            unique: false,
            not_null,
            default,
        }
    }

    /// Whether the column rejects NULL, counting primary keys as NOT NULL.
    #[must_use]
    pub const fn effective_not_null(&self) -> bool {
        self.not_null || self.primary_key
    }

    /// Whether the column rejects duplicates, counting primary keys as
    /// unique. Key columns never carry a separate UNIQUE clause.
    #[must_use]
    pub const fn effective_unique(&self) -> bool {
        self.unique || self.primary_key
    }
}

/// An index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDescriptor {
    /// Index name.
    pub name: String,
    /// Columns in index order.
    pub columns: Vec<String>,
}

/// A uniqueness constraint over a set of columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniqueDescriptor {
    /// Group name, when one is known.
    pub name: Option<String>,
    /// Columns; order is irrelevant for comparison.
    pub columns: Vec<String>,
}

impl UniqueDescriptor {
    /// Lower-cased, sorted column set used for comparisons.
    #[must_use]
    pub fn column_set(&self) -> Vec<String> {
        let mut set: Vec<String> = self.columns.iter().map(|c| c.to_lowercase()).collect();
        set.sort();
        set.dedup();
        set
    }
}

/// Canonical metadata for one entity type.
///
/// Built once from an [`EntityMapping`], immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    /// Table or view name.
    pub name: String,
    /// Table or view.
    pub kind: EntityKind,
    /// Columns in field order.
    pub columns: Vec<ColumnDescriptor>,
    /// Indices, one per distinct group.
    pub indexes: Vec<IndexDescriptor>,
    /// Multi-column uniqueness constraints.
    pub uniques: Vec<UniqueDescriptor>,
}

impl EntityDescriptor {
    /// Builds and validates a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidModel`] when more than one column is a primary
    /// key, two fields map to the same column, or a non-key column is
    /// auto-incremented.
    pub fn build(mapping: &EntityMapping) -> Result<Self> {
        let mut columns: Vec<ColumnDescriptor> = Vec::new();
        let mut indexes: Vec<IndexDescriptor> = Vec::new();
        let mut unique_groups: Vec<UniqueDescriptor> = Vec::new();

        for field in mapping.fields.iter().filter(|f| !f.ignore) {
            let mut column = ColumnDescriptor::from_field(field);

            for group in &field.indexes {
                let name = match group {
                    GroupRef::Unnamed => column.name.clone(),
                    GroupRef::Named(name) => name.clone(),
                };
                push_member(&mut indexes, &name, &column.name, |name| IndexDescriptor {
                    name,
                    columns: Vec::new(),
                });
            }

            for group in &field.uniques {
                match group {
                    GroupRef::Unnamed => column.unique = true,
                    GroupRef::Named(name) => {
                        push_member(&mut unique_groups, name, &column.name, |name| {
                            UniqueDescriptor {
                                name: Some(name),
                                columns: Vec::new(),
                            }
                        });
                    }
                }
            }

            columns.push(column);
        }

        // A named unique group covering a single column is the same
        // constraint as the column flag.
        let mut uniques = Vec::new();
        for group in unique_groups {
            if group.columns.len() == 1 {
                let only = &group.columns[0];
                if let Some(column) = columns.iter_mut().find(|c| &c.name == only) {
                    column.unique = true;
                }
            } else {
                uniques.push(group);
            }
        }

        let descriptor = Self {
            name: mapping.name.clone(),
            kind: mapping.kind.clone(),
            columns,
            indexes,
            uniques,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidModel {
            entity: self.name.clone(),
            reason,
        };

        let keys: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect();
        if keys.len() > 1 {
            return Err(invalid(format!(
                "multiple primary key columns: {}",
                keys.join(", ")
            )));
        }

        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&column.name))
            {
                return Err(invalid(format!("duplicate column '{}'", column.name)));
            }
            if column.autoincrement && !column.primary_key {
                return Err(invalid(format!(
                    "column '{}' is autoincrement but not the primary key",
                    column.name
                )));
            }
        }

        Ok(())
    }

    /// Returns `true` when the entity is backed by a view.
    #[must_use]
    pub const fn is_view(&self) -> bool {
        matches!(self.kind, EntityKind::View { .. })
    }

    /// Returns the primary key column, if any.
    #[must_use]
    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Looks up a column by name, ignoring ASCII case.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Looks up a column by the Rust field it is read from.
    #[must_use]
    pub fn column_for_field(&self, field: &str, case_insensitive: bool) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| {
            if case_insensitive {
                c.field.eq_ignore_ascii_case(field)
            } else {
                c.field == field
            }
        })
    }

    /// Column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

trait Group {
    fn group_name(&self) -> &str;
    fn members(&mut self) -> &mut Vec<String>;
}

impl Group for IndexDescriptor {
    fn group_name(&self) -> &str {
        &self.name
    }

    fn members(&mut self) -> &mut Vec<String> {
        &mut self.columns
    }
}

impl Group for UniqueDescriptor {
    fn group_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    fn members(&mut self) -> &mut Vec<String> {
        &mut self.columns
    }
}

fn push_member<G: Group>(groups: &mut Vec<G>, name: &str, column: &str, create: impl FnOnce(String) -> G) {
    let position = match groups.iter().position(|g| g.group_name() == name) {
        Some(position) => position,
        None => {
            groups.push(create(name.to_string()));
            groups.len() - 1
        }
    };
    let members = groups[position].members();
    if !members.iter().any(|c| c == column) {
        members.push(column.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::mapping::FieldMapping;

    fn sample() -> EntityMapping {
        EntityMapping::table("users")
            .field(FieldMapping::new("Id", "i64").primary_key().autoincrement())
            .field(FieldMapping::new("Name", "String").index_named("idx_name_email"))
            .field(FieldMapping::new("Email", "Option<String>").index_named("idx_name_email").unique())
            .field(FieldMapping::new("Active", "bool").default(DefaultValue::Bool(true)).index())
            .field(FieldMapping::new("Cache", "Vec<String>").ignore())
    }

    #[test]
    fn test_column_names_are_lowercased() {
        let desc = EntityDescriptor::build(&sample()).unwrap();
        assert_eq!(desc.column_names(), vec!["id", "name", "email", "active"]);
    }

    #[test]
    fn test_not_null_inference() {
        let desc = EntityDescriptor::build(&sample()).unwrap();
        assert!(desc.column("id").unwrap().not_null);
        assert!(!desc.column("name").unwrap().not_null);
        assert!(!desc.column("email").unwrap().not_null);
        assert!(desc.column("active").unwrap().not_null);
    }

    #[test]
    fn test_not_null_override() {
        let mapping = EntityMapping::table("t")
            .field(FieldMapping::new("a", "String").not_null())
            .field(FieldMapping::new("b", "i32").nullable());
        let desc = EntityDescriptor::build(&mapping).unwrap();
        assert!(desc.column("a").unwrap().not_null);
        assert!(!desc.column("b").unwrap().not_null);
    }

    #[test]
    fn test_index_groups() {
        let desc = EntityDescriptor::build(&sample()).unwrap();
        assert_eq!(
            desc.indexes,
            vec![
                IndexDescriptor {
                    name: String::from("idx_name_email"),
                    columns: vec![String::from("name"), String::from("email")],
                },
                IndexDescriptor {
                    name: String::from("active"),
                    columns: vec![String::from("active")],
                },
            ]
        );
    }

    #[test]
    fn test_unnamed_unique_is_column_flag() {
        let desc = EntityDescriptor::build(&sample()).unwrap();
        assert!(desc.column("email").unwrap().unique);
        assert!(desc.uniques.is_empty());
    }

    #[test]
    fn test_named_unique_groups() {
        let mapping = EntityMapping::table("t")
            .field(FieldMapping::new("a", "i32").unique_named("ab"))
            .field(FieldMapping::new("b", "i32").unique_named("ab"))
            .field(FieldMapping::new("c", "i32").unique_named("solo"));
        let desc = EntityDescriptor::build(&mapping).unwrap();
        assert_eq!(desc.uniques.len(), 1);
        assert_eq!(desc.uniques[0].columns, vec!["a", "b"]);
        assert!(desc.column("c").unwrap().unique);
    }

    #[test]
    fn test_primary_key_default_suppressed() {
        let mapping = EntityMapping::table("t")
            .field(FieldMapping::new("id", "i32").primary_key().default(DefaultValue::Integer(7)));
        let desc = EntityDescriptor::build(&mapping).unwrap();
        assert_eq!(desc.primary_key().unwrap().default, None);
    }

    #[test]
    fn test_enum_repr_unwraps_to_integer() {
        let mapping = EntityMapping::table("t")
            .field(FieldMapping::new("status", "Status").enum_repr("i32"))
            .field(FieldMapping::new("previous", "Option<Status>").enum_repr("u8"));
        let desc = EntityDescriptor::build(&mapping).unwrap();
        let status = desc.column("status").unwrap();
        assert_eq!(status.canonical, CanonicalType::I32);
        assert!(status.not_null);
        let previous = desc.column("previous").unwrap();
        assert_eq!(previous.canonical, CanonicalType::U8);
        assert!(!previous.not_null);
    }

    #[test]
    fn test_multiple_primary_keys_rejected() {
        let mapping = EntityMapping::table("t")
            .field(FieldMapping::new("a", "i32").primary_key())
            .field(FieldMapping::new("b", "i32").primary_key());
        let err = EntityDescriptor::build(&mapping).unwrap_err();
        assert!(matches!(err, Error::InvalidModel { .. }));
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let mapping = EntityMapping::table("t")
            .field(FieldMapping::new("a", "i32"))
            .field(FieldMapping::new("b", "i32").column("A"));
        assert!(matches!(
            EntityDescriptor::build(&mapping),
            Err(Error::InvalidModel { .. })
        ));
    }

    #[test]
    fn test_autoincrement_without_key_rejected() {
        let mapping = EntityMapping::table("t").field(FieldMapping::new("a", "i32").autoincrement());
        assert!(EntityDescriptor::build(&mapping).is_err());
    }
}
