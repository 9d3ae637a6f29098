//! Schema updates: introspect, diff and migrate in one transaction.

use tabula_core::dialect::SqliteDialect;
use tabula_core::entity::EntityKind;
use tabula_core::migration::{plan_table_migration, plan_view_migration};
use tabula_core::{Entity, EntityDescriptor, MigrationPlan, SchemaDescriptor};
use tracing::{debug, info, warn};

use crate::client::SqliteClient;
use crate::error::{ClientError, Result};
use crate::introspect;

/// What a schema update did.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationOutcome {
    /// Table or view name.
    pub entity: String,
    /// The executed plan.
    pub plan: MigrationPlan,
    /// Number of statements executed.
    pub executed: usize,
}

impl MigrationOutcome {
    /// Returns `true` when the schema already matched the model.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.plan.is_noop()
    }
}

impl SqliteClient {
    /// Brings the table or view of `E` in line with its model.
    ///
    /// Introspection, planning and every statement run in one transaction:
    /// on failure nothing is changed. Running it again on an unchanged
    /// model executes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::KindConflict`] when the live object is a
    /// table and the model a view (or the reverse), and the statement
    /// error of any failing step.
    pub async fn update_schema<E: Entity>(&self) -> Result<MigrationOutcome> {
        let model = self.descriptor::<E>()?;
        self.update_schema_for(&model).await
    }

    /// [`update_schema`](Self::update_schema) for an explicit descriptor.
    ///
    /// # Errors
    ///
    /// Same as [`update_schema`](Self::update_schema).
    pub async fn update_schema_for(&self, model: &EntityDescriptor) -> Result<MigrationOutcome> {
        let dialect = SqliteDialect::new();
        let mut transaction = self.begin().await?;
        let live = introspect::describe(transaction.connection(), &dialect, &model.name).await?;
        let plan = plan(&dialect, model, live)?;
        info!(entity = %model.name, plan = plan.kind(), "Schema update planned");

        let mut executed = 0;
        match &plan {
            MigrationPlan::NoOp => {}
            MigrationPlan::Recreate(recreate) => {
                warn!(
                    table = %recreate.table,
                    scratch = %recreate.scratch,
                    "Recreating table and copying data forward"
                );
                for (step, statements) in recreate.steps() {
                    debug!(table = %recreate.table, step = ?step, "Recreate step");
                    for sql in statements {
                        transaction.execute_sql(sql).await?;
                        executed += 1;
                    }
                }
            }
            other => {
                if let MigrationPlan::InPlace { diff, .. } = other {
                    for column in diff.obsolete() {
                        warn!(table = %diff.table, column = %column.name, "Dropping obsolete column");
                    }
                }
                for sql in other.statements() {
                    transaction.execute_sql(&sql).await?;
                    executed += 1;
                }
            }
        }
        transaction.commit().await?;

        if executed > 0 {
            info!(entity = %model.name, statements = executed, "Schema updated");
        }
        Ok(MigrationOutcome {
            entity: model.name.clone(),
            plan,
            executed,
        })
    }
}

fn plan(
    dialect: &SqliteDialect,
    model: &EntityDescriptor,
    live: Option<SchemaDescriptor>,
) -> Result<MigrationPlan> {
    let conflict = |live: &'static str, declared: &'static str| ClientError::KindConflict {
        name: model.name.clone(),
        live,
        model: declared,
    };
    match (&model.kind, live) {
        (EntityKind::Table, None) => Ok(plan_table_migration(dialect, model, None)),
        (EntityKind::Table, Some(SchemaDescriptor::Table(table))) => {
            Ok(plan_table_migration(dialect, model, Some(&table)))
        }
        (EntityKind::View { .. }, None) => Ok(plan_view_migration(dialect, model, None)),
        (EntityKind::View { .. }, Some(SchemaDescriptor::View(view))) => {
            Ok(plan_view_migration(dialect, model, Some(&view)))
        }
        (EntityKind::Table, Some(SchemaDescriptor::View(_))) => Err(conflict("view", "table")),
        (EntityKind::View { .. }, Some(SchemaDescriptor::Table(_))) => Err(conflict("table", "view")),
    }
}
