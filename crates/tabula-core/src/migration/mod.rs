//! Schema migration.
//!
//! [`SchemaDiff`] classifies how a live table differs from its model and
//! the planners turn that into ordered statements: nothing, a fresh
//! `CREATE`, in-place `ALTER`s or a full table rebuild with data copy.

mod diff;
mod plan;

pub use diff::{ColumnChange, SchemaDiff};
pub use plan::{
    create_table_statements, definition_hash, plan_table_migration, plan_view_migration,
    MigrationPlan, RecreatePlan, RecreateStep, SCRATCH_PREFIX,
};
