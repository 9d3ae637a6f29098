//! Declarative mapping descriptions.
//!
//! A mapping is the raw, per-field description of how a type is stored. It
//! is usually generated by `#[derive(Entity)]` but can be written by hand
//! with the builder methods below.

use crate::value::{DefaultValue, SqlValue};

/// A type stored in one table or view.
pub trait Entity: 'static {
    /// Returns the declarative mapping for this type.
    fn mapping() -> EntityMapping;

    /// Returns the current field values, keyed by Rust field name.
    ///
    /// Ignored fields are not included.
    fn to_values(&self) -> Vec<(&'static str, SqlValue)>;
}

/// Whether an entity is backed by a table or a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    /// A regular table.
    Table,
    /// A view created from the given `SELECT` body.
    View {
        /// The view body, without the `CREATE VIEW .. AS` prefix.
        definition: String,
    },
}

/// Membership in an index or unique group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    /// No explicit group: a single-column index named after the column, or a
    /// column-level `UNIQUE` flag.
    Unnamed,
    /// A named group; every field naming it joins the same index or
    /// constraint, in field order.
    Named(String),
}

/// Mapping description for a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    /// Rust field name.
    pub field: String,
    /// Rust type as written, e.g. `Option<i64>`.
    pub rust_type: String,
    /// Explicit column name.
    pub column: Option<String>,
    /// Whether the column is the primary key.
    pub primary_key: bool,
    /// Whether the column is auto-incremented.
    pub autoincrement: bool,
    /// Explicit NOT NULL override.
    pub not_null: Option<bool>,
    /// Declared default value.
    pub default: Option<DefaultValue>,
    /// Optional size for sized types (`VARCHAR(n)`).
    pub size: Option<u32>,
    /// Underlying integer type for enums, e.g. `i32`.
    pub enum_repr: Option<String>,
    /// Index groups the column belongs to.
    pub indexes: Vec<GroupRef>,
    /// Unique groups the column belongs to.
    pub uniques: Vec<GroupRef>,
    /// Whether the field is not stored at all.
    pub ignore: bool,
}

impl FieldMapping {
    /// Creates a mapping for the given field and Rust type.
    #[must_use]
    pub fn new(field: impl Into<String>, rust_type: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rust_type: rust_type.into(),
            column: None,
            primary_key: false,
            autoincrement: false,
            not_null: None,
            default: None,
            size: None,
            enum_repr: None,
            indexes: Vec::new(),
            uniques: Vec::new(),
            ignore: false,
        }
    }

    /// Overrides the column name.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column = Some(name.into());
        self
    }

    /// Marks the column as primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the column as auto-incremented.
    #[must_use]
    pub const fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// Forces NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.not_null = Some(true);
        self
    }

    /// Forces the column to be nullable.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.not_null = Some(false);
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Sets the type size.
    #[must_use]
    pub const fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Stores the field (an enum) as the given integer type.
    #[must_use]
    pub fn enum_repr(mut self, repr: impl Into<String>) -> Self {
        self.enum_repr = Some(repr.into());
        self
    }

    /// Adds a single-column index named after the column.
    #[must_use]
    pub fn index(mut self) -> Self {
        self.indexes.push(GroupRef::Unnamed);
        self
    }

    /// Joins the named index group.
    #[must_use]
    pub fn index_named(mut self, name: impl Into<String>) -> Self {
        self.indexes.push(GroupRef::Named(name.into()));
        self
    }

    /// Marks the column itself as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.uniques.push(GroupRef::Unnamed);
        self
    }

    /// Joins the named unique group.
    #[must_use]
    pub fn unique_named(mut self, name: impl Into<String>) -> Self {
        self.uniques.push(GroupRef::Named(name.into()));
        self
    }

    /// Excludes the field from storage.
    #[must_use]
    pub const fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }
}

/// Mapping description for a whole entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMapping {
    /// Table or view name.
    pub name: String,
    /// Table or view.
    pub kind: EntityKind,
    /// Fields in declaration order.
    pub fields: Vec<FieldMapping>,
}

impl EntityMapping {
    /// Starts a table mapping.
    #[must_use]
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::Table,
            fields: Vec::new(),
        }
    }

    /// Starts a view mapping with the given `SELECT` body.
    #[must_use]
    pub fn view(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::View {
                definition: definition.into(),
            },
            fields: Vec::new(),
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldMapping) -> Self {
        self.fields.push(field);
        self
    }
}
