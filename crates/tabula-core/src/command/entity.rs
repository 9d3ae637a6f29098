//! Insert, update, delete, load and count commands for one entity.

use std::sync::Arc;

use crate::compiler::{CompileOptions, ExpressionCompiler};
use crate::dialect::Dialect;
use crate::entity::{ColumnDescriptor, Entity, EntityDescriptor};
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::operation::{Arg, OperationBuilder, PreparedOperation};
use crate::value::SqlValue;

use super::select::SelectQuery;

/// Command builders bound to one entity and dialect.
///
/// Every builder returns a [`PreparedOperation`] whose slots are filled by
/// the matching `*_args` method, so one prepared command can be executed
/// for many entity values.
#[derive(Debug, Clone)]
pub struct EntityCommands {
    descriptor: Arc<EntityDescriptor>,
    dialect: Arc<dyn Dialect>,
    options: CompileOptions,
}

impl EntityCommands {
    /// Binds `descriptor` to `dialect`.
    #[must_use]
    pub fn new(descriptor: Arc<EntityDescriptor>, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            descriptor,
            dialect,
            options: CompileOptions::new(),
        }
    }

    /// Resolves filter properties ignoring ASCII case.
    #[must_use]
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.options = self.options.case_insensitive(enabled);
        self
    }

    /// The entity descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.descriptor
    }

    fn misuse(&self, operation: &'static str, reason: &str) -> Error {
        Error::StructuralMisuse {
            operation,
            entity: self.descriptor.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn writable(&self, operation: &'static str) -> Result<()> {
        if self.descriptor.is_view() {
            return Err(self.misuse(operation, "views are read-only"));
        }
        Ok(())
    }

    fn primary_key(&self, operation: &'static str) -> Result<&ColumnDescriptor> {
        self.descriptor
            .primary_key()
            .ok_or_else(|| self.misuse(operation, "entity has no primary key"))
    }

    /// Columns written by [`insert`](Self::insert): everything except an
    /// auto-incremented key.
    pub fn insert_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.descriptor.columns.iter().filter(|c| !c.autoincrement)
    }

    fn update_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.descriptor.columns.iter().filter(|c| !c.primary_key)
    }

    /// `INSERT INTO t (..) VALUES (..)` with one slot per inserted column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StructuralMisuse`] for views and for entities with
    /// no insertable column.
    pub fn insert(&self) -> Result<PreparedOperation> {
        self.writable("insert")?;
        let columns: Vec<&ColumnDescriptor> = self.insert_columns().collect();
        if columns.is_empty() {
            return Err(self.misuse("insert", "no insertable columns"));
        }

        let mut out = OperationBuilder::new(Arc::clone(&self.dialect));
        out.text("INSERT INTO ").quoted(&self.descriptor.name).text(" (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                out.text(", ");
            }
            out.quoted(&column.name);
        }
        out.text(") VALUES (");
        for i in 0..columns.len() {
            if i > 0 {
                out.text(", ");
            }
            out.arg();
        }
        out.text(")");
        Ok(out.build())
    }

    /// Arguments for [`insert`](Self::insert).
    pub fn insert_args<E: Entity>(&self, entity: &E) -> Vec<Arg> {
        let values = entity.to_values();
        self.insert_columns()
            .map(|c| Arg::Value(field_value(&values, &c.field)))
            .collect()
    }

    /// `UPDATE t SET .. WHERE pk = ?`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StructuralMisuse`] for views, for entities without
    /// a primary key and for entities with nothing but a key.
    pub fn update(&self) -> Result<PreparedOperation> {
        self.writable("update")?;
        let key = self.primary_key("update")?;
        let columns: Vec<&ColumnDescriptor> = self.update_columns().collect();
        if columns.is_empty() {
            return Err(self.misuse("update", "no columns besides the primary key"));
        }

        let mut out = OperationBuilder::new(Arc::clone(&self.dialect));
        out.text("UPDATE ").quoted(&self.descriptor.name).text(" SET ");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                out.text(", ");
            }
            out.quoted(&column.name).text(" = ").arg();
        }
        out.text(" WHERE ").quoted(&key.name).text(" = ").arg();
        Ok(out.build())
    }

    /// Arguments for [`update`](Self::update): the new values, then the key.
    pub fn update_args<E: Entity>(&self, entity: &E) -> Vec<Arg> {
        let values = entity.to_values();
        let mut args: Vec<Arg> = self
            .update_columns()
            .map(|c| Arg::Value(field_value(&values, &c.field)))
            .collect();
        if let Some(key) = self.descriptor.primary_key() {
            args.push(Arg::Value(field_value(&values, &key.field)));
        }
        args
    }

    /// `DELETE FROM t WHERE pk = ?`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StructuralMisuse`] for views and for entities
    /// without a primary key.
    pub fn delete(&self) -> Result<PreparedOperation> {
        self.writable("delete")?;
        let key = self.primary_key("delete")?;
        let mut out = OperationBuilder::new(Arc::clone(&self.dialect));
        out.text("DELETE FROM ")
            .quoted(&self.descriptor.name)
            .text(" WHERE ")
            .quoted(&key.name)
            .text(" = ")
            .arg();
        Ok(out.build())
    }

    /// Arguments for [`delete`](Self::delete).
    pub fn delete_args<E: Entity>(&self, entity: &E) -> Vec<Arg> {
        let values = entity.to_values();
        self.descriptor
            .primary_key()
            .map(|key| vec![Arg::Value(field_value(&values, &key.field))])
            .unwrap_or_default()
    }

    /// `DELETE FROM t WHERE pk IN (..)`; the key list is an array slot.
    ///
    /// # Errors
    ///
    /// Same as [`delete`](Self::delete).
    pub fn delete_many(&self) -> Result<PreparedOperation> {
        self.writable("delete")?;
        let key = self.primary_key("delete")?;
        let mut out = OperationBuilder::new(Arc::clone(&self.dialect));
        out.text("DELETE FROM ")
            .quoted(&self.descriptor.name)
            .text(" WHERE ")
            .quoted(&key.name)
            .text(" IN (")
            .array_arg()
            .text(")");
        Ok(out.build())
    }

    /// A [`SelectQuery`] over this entity.
    #[must_use]
    pub fn select(&self) -> SelectQuery {
        SelectQuery::new(Arc::clone(&self.descriptor)).case_insensitive(self.options.case_insensitive)
    }

    /// Loads every mapped column of the rows matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns the compilation error of `filter`.
    pub fn load(&self, filter: Option<Expr>) -> Result<PreparedOperation> {
        let query = match filter {
            Some(filter) => self.select().filter(filter),
            None => self.select(),
        };
        query.build(Arc::clone(&self.dialect))
    }

    /// `SELECT COUNT(*) FROM t [WHERE ..]`.
    ///
    /// # Errors
    ///
    /// Returns the compilation error of `filter`.
    pub fn count(&self, filter: Option<&Expr>) -> Result<PreparedOperation> {
        let mut out = OperationBuilder::new(Arc::clone(&self.dialect));
        out.text("SELECT COUNT(*) FROM ").quoted(&self.descriptor.name);
        if let Some(filter) = filter {
            let token =
                ExpressionCompiler::new(&self.descriptor, self.options.clone()).compile(filter)?;
            out.text(" WHERE ").token(&token);
        }
        Ok(out.build())
    }
}

fn field_value(values: &[(&'static str, SqlValue)], field: &str) -> SqlValue {
    values
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, value)| value.clone())
        .unwrap_or(SqlValue::Null)
}
