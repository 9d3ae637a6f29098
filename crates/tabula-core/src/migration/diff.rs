//! Model-versus-live schema comparison.

use crate::dialect::Dialect;
use crate::entity::{ColumnDescriptor, EntityDescriptor, IndexDescriptor, UniqueDescriptor};
use crate::schema::{LiveColumn, TableDescriptor};

/// How a single column differs between the model and the live table.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    /// In the model, absent from the table.
    Missing(ColumnDescriptor),
    /// In the table, absent from the model.
    Obsolete(LiveColumn),
    /// On both sides with a different type, key, uniqueness or nullability.
    Altered {
        /// Desired column.
        model: ColumnDescriptor,
        /// Current column.
        live: LiveColumn,
    },
}

/// Everything that separates a live table from its model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    /// Table name.
    pub table: String,
    /// Column changes, obsolete columns first.
    pub columns: Vec<ColumnChange>,
    /// Model indices absent from the table.
    pub missing_indexes: Vec<IndexDescriptor>,
    /// Live indices absent from the model.
    pub obsolete_indexes: Vec<IndexDescriptor>,
    /// Indices present on both sides with different columns (model version).
    pub altered_indexes: Vec<IndexDescriptor>,
    /// Model uniqueness constraints absent from the table.
    pub missing_uniques: Vec<UniqueDescriptor>,
    /// Live uniqueness constraints absent from the model.
    pub obsolete_uniques: Vec<UniqueDescriptor>,
    /// The live table the diff was computed against.
    pub live: TableDescriptor,
}

impl SchemaDiff {
    /// Classifies every difference between `model` and `live`.
    ///
    /// Types are compared through [`Dialect::types_equivalent`]; declared
    /// defaults are not compared.
    #[must_use]
    pub fn diagnose(dialect: &dyn Dialect, model: &EntityDescriptor, live: &TableDescriptor) -> Self {
        let mut columns = Vec::new();

        for column in &live.columns {
            if model.column(&column.name).is_none() {
                columns.push(ColumnChange::Obsolete(column.clone()));
            }
        }
        for column in &model.columns {
            match live.column(&column.name) {
                None => columns.push(ColumnChange::Missing(column.clone())),
                Some(existing) if column_differs(dialect, column, existing) => {
                    columns.push(ColumnChange::Altered {
                        model: column.clone(),
                        live: existing.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        let mut missing_indexes = Vec::new();
        let mut altered_indexes = Vec::new();
        for index in &model.indexes {
            match live.index(&index.name) {
                None => missing_indexes.push(index.clone()),
                Some(existing) if !same_columns(&index.columns, &existing.columns) => {
                    altered_indexes.push(index.clone());
                }
                Some(_) => {}
            }
        }
        let obsolete_indexes = live
            .indexes
            .iter()
            .filter(|i| {
                !model
                    .indexes
                    .iter()
                    .any(|m| m.name.eq_ignore_ascii_case(&i.name))
            })
            .cloned()
            .collect();

        let missing_uniques = model
            .uniques
            .iter()
            .filter(|u| !live.uniques.iter().any(|l| l.column_set() == u.column_set()))
            .cloned()
            .collect();
        let obsolete_uniques = live
            .uniques
            .iter()
            .filter(|l| !model.uniques.iter().any(|u| u.column_set() == l.column_set()))
            .cloned()
            .collect();

        Self {
            table: model.name.clone(),
            columns,
            missing_indexes,
            obsolete_indexes,
            altered_indexes,
            missing_uniques,
            obsolete_uniques,
            live: live.clone(),
        }
    }

    /// Returns `true` when model and table already agree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
            && self.missing_indexes.is_empty()
            && self.obsolete_indexes.is_empty()
            && self.altered_indexes.is_empty()
            && self.missing_uniques.is_empty()
            && self.obsolete_uniques.is_empty()
    }

    /// Columns to add.
    pub fn missing(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter_map(|c| match c {
            ColumnChange::Missing(model) => Some(model),
            _ => None,
        })
    }

    /// Columns to drop.
    pub fn obsolete(&self) -> impl Iterator<Item = &LiveColumn> {
        self.columns.iter().filter_map(|c| match c {
            ColumnChange::Obsolete(live) => Some(live),
            _ => None,
        })
    }

    /// Columns to alter, as `(model, live)` pairs.
    pub fn altered(&self) -> impl Iterator<Item = (&ColumnDescriptor, &LiveColumn)> {
        self.columns.iter().filter_map(|c| match c {
            ColumnChange::Altered { model, live } => Some((model, live)),
            _ => None,
        })
    }
}

fn column_differs(dialect: &dyn Dialect, model: &ColumnDescriptor, live: &LiveColumn) -> bool {
    let native = dialect.native_type(&model.canonical, model.size);
    !dialect.types_equivalent(&native, &live.native_type)
        || model.primary_key != live.primary_key
        || model.autoincrement != live.autoincrement
        || model.effective_unique() != live.effective_unique()
        || model.effective_not_null() != live.effective_not_null()
}

fn same_columns(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}
