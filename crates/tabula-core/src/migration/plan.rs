//! Migration planning.
//!
//! Planning is pure: it turns a model and a live snapshot into the ordered
//! statements that reconcile them. Executing a plan inside one transaction
//! is the client's job.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::dialect::Dialect;
use crate::entity::{EntityDescriptor, EntityKind};
use crate::schema::{TableDescriptor, ViewDescriptor};

use super::diff::SchemaDiff;

/// Prefix of the scratch table used while recreating a table.
pub const SCRATCH_PREFIX: &str = "__tabula_tmp_";

/// What a schema update will do.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationPlan {
    /// Model and database agree.
    NoOp,
    /// The table does not exist yet.
    CreateTable(Vec<String>),
    /// Columns, indices and uniques are reconciled with `ALTER` statements.
    InPlace {
        /// The differences being applied.
        diff: SchemaDiff,
        /// Statements in execution order.
        statements: Vec<String>,
    },
    /// The table is rebuilt and its data copied forward.
    Recreate(RecreatePlan),
    /// The view does not exist yet.
    CreateView(Vec<String>),
    /// The view body changed; it is dropped and created again.
    ReplaceView(Vec<String>),
}

impl MigrationPlan {
    /// Short label for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NoOp => "no-op",
            Self::CreateTable(_) => "create-table",
            Self::InPlace { .. } => "in-place",
            Self::Recreate(_) => "recreate",
            Self::CreateView(_) => "create-view",
            Self::ReplaceView(_) => "replace-view",
        }
    }

    /// Returns `true` when nothing will be executed.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }

    /// Every statement in execution order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        match self {
            Self::NoOp => Vec::new(),
            Self::CreateTable(statements)
            | Self::InPlace { statements, .. }
            | Self::CreateView(statements)
            | Self::ReplaceView(statements) => statements.clone(),
            Self::Recreate(plan) => plan
                .steps()
                .flat_map(|(_, statements)| statements.iter().cloned())
                .collect(),
        }
    }
}

/// States of a table recreation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecreateStep {
    /// Differences classified; nothing executed yet.
    Diagnose,
    /// Stale scratch table removed, live table renamed to the scratch name
    /// and its indices dropped.
    Rename,
    /// New table and its indices created from the model.
    CreateNew,
    /// Common columns copied from the scratch table.
    CopyData,
    /// Scratch table dropped.
    DropOld,
    /// Finished.
    Done,
}

impl RecreateStep {
    /// The step that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Diagnose => Self::Rename,
            Self::Rename => Self::CreateNew,
            Self::CreateNew => Self::CopyData,
            Self::CopyData => Self::DropOld,
            Self::DropOld | Self::Done => Self::Done,
        }
    }
}

/// Ordered statements for rebuilding a table with data carry-over.
#[derive(Debug, Clone, PartialEq)]
pub struct RecreatePlan {
    /// Table being rebuilt.
    pub table: String,
    /// Scratch name the live table is moved to.
    pub scratch: String,
    /// The differences that forced the rebuild.
    pub diff: SchemaDiff,
    rename: Vec<String>,
    create: Vec<String>,
    copy: Vec<String>,
    drop_old: Vec<String>,
}

impl RecreatePlan {
    fn new(dialect: &dyn Dialect, model: &EntityDescriptor, diff: SchemaDiff) -> Self {
        let table = model.name.clone();
        let scratch = format!("{SCRATCH_PREFIX}{table}");

        let mut rename = vec![dialect.drop_table(&scratch)];
        rename.extend(dialect.rename_for_rebuild(&table, &scratch));
        // Index names are global in some databases and travel with the
        // renamed table.
        rename.extend(
            diff.live
                .indexes
                .iter()
                .map(|index| dialect.drop_index(&scratch, &index.name)),
        );

        let create = create_table_statements(dialect, model);

        let mut targets = Vec::new();
        let mut sources = Vec::new();
        for column in &model.columns {
            match diff.live.column(&column.name) {
                Some(old) => {
                    targets.push(dialect.quote_identifier(&column.name));
                    let source = dialect.quote_identifier(&old.name);
                    if column.effective_not_null() && !old.effective_not_null() {
                        sources.push(format!(
                            "COALESCE({source}, {})",
                            dialect.fill_value(column)
                        ));
                    } else {
                        sources.push(source);
                    }
                }
                None if column.effective_not_null() && !column.autoincrement => {
                    targets.push(dialect.quote_identifier(&column.name));
                    sources.push(dialect.fill_value(column));
                }
                None => {}
            }
        }
        let copy = if targets.is_empty() {
            Vec::new()
        } else {
            vec![format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                dialect.quote_identifier(&table),
                targets.join(", "),
                sources.join(", "),
                dialect.quote_identifier(&scratch)
            )]
        };

        let drop_old = vec![dialect.drop_table(&scratch)];

        Self {
            table,
            scratch,
            diff,
            rename,
            create,
            copy,
            drop_old,
        }
    }

    /// Statements executed when entering `step`.
    #[must_use]
    pub fn statements(&self, step: RecreateStep) -> &[String] {
        match step {
            RecreateStep::Rename => self.rename.as_slice(),
            RecreateStep::CreateNew => self.create.as_slice(),
            RecreateStep::CopyData => self.copy.as_slice(),
            RecreateStep::DropOld => self.drop_old.as_slice(),
            RecreateStep::Diagnose | RecreateStep::Done => &[],
        }
    }

    /// Walks the state machine from [`RecreateStep::Diagnose`] to
    /// [`RecreateStep::Done`], yielding each executing step.
    pub fn steps(&self) -> impl Iterator<Item = (RecreateStep, &[String])> {
        std::iter::successors(Some(RecreateStep::Diagnose.next()), |step| {
            Some(step.next()).filter(|next| *next != RecreateStep::Done)
        })
        .map(|step| (step, self.statements(step)))
    }
}

/// `CREATE TABLE` followed by one `CREATE INDEX` per index.
#[must_use]
pub fn create_table_statements(dialect: &dyn Dialect, model: &EntityDescriptor) -> Vec<String> {
    let mut statements = vec![dialect.create_table(model)];
    statements.extend(
        model
            .indexes
            .iter()
            .map(|index| dialect.create_index(&model.name, index)),
    );
    statements
}

/// Plans the reconciliation of a table with its model.
///
/// `live` is `None` when the table does not exist.
#[must_use]
pub fn plan_table_migration(
    dialect: &dyn Dialect,
    model: &EntityDescriptor,
    live: Option<&TableDescriptor>,
) -> MigrationPlan {
    let Some(live) = live else {
        return MigrationPlan::CreateTable(create_table_statements(dialect, model));
    };

    let diff = SchemaDiff::diagnose(dialect, model, live);
    if diff.is_empty() {
        return MigrationPlan::NoOp;
    }
    if dialect.requires_recreate(&diff) {
        return MigrationPlan::Recreate(RecreatePlan::new(dialect, model, diff));
    }

    let table = model.name.as_str();
    let mut statements = Vec::new();
    statements.extend(diff.obsolete().map(|c| dialect.drop_column(table, &c.name)));
    statements.extend(diff.missing().map(|c| dialect.add_column(table, c)));
    for (column, _) in diff.altered() {
        statements.extend(dialect.alter_column(table, column).unwrap_or_default());
    }
    statements.extend(
        diff.obsolete_indexes
            .iter()
            .chain(&diff.altered_indexes)
            .map(|index| dialect.drop_index(table, &index.name)),
    );
    statements.extend(
        diff.altered_indexes
            .iter()
            .chain(&diff.missing_indexes)
            .map(|index| dialect.create_index(table, index)),
    );
    statements.extend(
        diff.missing_uniques
            .iter()
            .map(|unique| dialect.add_unique(table, unique)),
    );

    // Obsolete uniques are kept, so a diff may have nothing to execute.
    if statements.is_empty() {
        return MigrationPlan::NoOp;
    }
    MigrationPlan::InPlace { diff, statements }
}

/// Plans the reconciliation of a view with its model.
///
/// `live` is `None` when the view does not exist. Bodies are compared by a
/// hash of their letters and digits, so whitespace and quoting differences
/// do not trigger a rebuild. Case is significant, since it is inside string
/// literals.
#[must_use]
pub fn plan_view_migration(
    dialect: &dyn Dialect,
    model: &EntityDescriptor,
    live: Option<&ViewDescriptor>,
) -> MigrationPlan {
    let EntityKind::View { definition } = &model.kind else {
        return MigrationPlan::NoOp;
    };
    let create = dialect.create_view(&model.name, definition);
    match live {
        None => MigrationPlan::CreateView(vec![create]),
        Some(live) if definition_hash(&live.definition) == definition_hash(definition) => {
            MigrationPlan::NoOp
        }
        Some(_) => MigrationPlan::ReplaceView(vec![dialect.drop_view(&model.name), create]),
    }
}

/// Hash of a view body's letters and digits.
#[must_use]
pub fn definition_hash(definition: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    for c in definition.chars().filter(|c| c.is_alphanumeric()) {
        c.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{PostgresDialect, SqliteDialect};
    use crate::entity::{EntityMapping, FieldMapping, IndexDescriptor, UniqueDescriptor};
    use crate::schema::LiveColumn;

    fn column(name: &str, native: &str, not_null: bool) -> LiveColumn {
        LiveColumn {
            name: name.to_string(),
            native_type: native.to_string(),
            primary_key: false,
            autoincrement: false,
            unique: false,
            not_null,
            default: None,
        }
    }

    /// `{field1:int, field2:string, field3:bool indexed "field3"}` as live.
    fn live_v1() -> TableDescriptor {
        TableDescriptor {
            name: String::from("evolving"),
            columns: vec![
                column("field1", "INTEGER", true),
                column("field2", "TEXT", false),
                column("field3", "INTEGER", true),
            ],
            indexes: vec![IndexDescriptor {
                name: String::from("field3"),
                columns: vec![String::from("field3")],
            }],
            uniques: Vec::new(),
        }
    }

    fn descriptor(mapping: EntityMapping) -> EntityDescriptor {
        EntityDescriptor::build(&mapping).unwrap()
    }

    fn v1() -> EntityMapping {
        EntityMapping::table("evolving")
            .field(FieldMapping::new("field1", "i32"))
            .field(FieldMapping::new("field2", "String"))
            .field(FieldMapping::new("field3", "bool").index())
    }

    #[test]
    fn test_missing_table_is_created_with_indices() {
        let plan = plan_table_migration(&SqliteDialect::new(), &descriptor(v1()), None);
        let statements = plan.statements();
        assert_eq!(plan.kind(), "create-table");
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE \"evolving\""));
        assert_eq!(
            statements[1],
            "CREATE INDEX \"field3\" ON \"evolving\" (\"field3\")"
        );
    }

    #[test]
    fn test_unchanged_model_is_noop() {
        let plan = plan_table_migration(&SqliteDialect::new(), &descriptor(v1()), Some(&live_v1()));
        assert!(plan.is_noop());
        assert!(plan.statements().is_empty());
    }

    #[test]
    fn test_added_indexed_column_is_in_place() {
        let model = descriptor(v1().field(FieldMapping::new("field4", "i32").index()));
        let plan = plan_table_migration(&SqliteDialect::new(), &model, Some(&live_v1()));
        assert_eq!(
            plan.statements(),
            vec![
                "ALTER TABLE \"evolving\" ADD COLUMN \"field4\" INTEGER NOT NULL DEFAULT 0",
                "CREATE INDEX \"field4\" ON \"evolving\" (\"field4\")",
            ]
        );
    }

    #[test]
    fn test_dropping_indexed_column_recreates_on_sqlite() {
        let model = descriptor(
            EntityMapping::table("evolving")
                .field(FieldMapping::new("field1", "i32"))
                .field(FieldMapping::new("field2", "String")),
        );
        let plan = plan_table_migration(&SqliteDialect::new(), &model, Some(&live_v1()));
        let MigrationPlan::Recreate(recreate) = &plan else {
            panic!("expected recreate, got {plan:?}");
        };
        assert_eq!(recreate.scratch, "__tabula_tmp_evolving");
        assert_eq!(
            recreate.statements(RecreateStep::Rename),
            [
                "DROP TABLE IF EXISTS \"__tabula_tmp_evolving\"",
                "PRAGMA legacy_alter_table = ON",
                "ALTER TABLE \"evolving\" RENAME TO \"__tabula_tmp_evolving\"",
                "PRAGMA legacy_alter_table = OFF",
                "DROP INDEX IF EXISTS \"field3\"",
            ]
        );
        assert_eq!(
            recreate.statements(RecreateStep::CopyData),
            ["INSERT INTO \"evolving\" (\"field1\", \"field2\") SELECT \"field1\", \"field2\" FROM \"__tabula_tmp_evolving\""]
        );
        assert_eq!(
            recreate.statements(RecreateStep::DropOld),
            ["DROP TABLE IF EXISTS \"__tabula_tmp_evolving\""]
        );
    }

    #[test]
    fn test_dropping_plain_column_is_in_place_on_sqlite() {
        let model = descriptor(
            EntityMapping::table("evolving")
                .field(FieldMapping::new("field1", "i32"))
                .field(FieldMapping::new("field3", "bool").index()),
        );
        let plan = plan_table_migration(&SqliteDialect::new(), &model, Some(&live_v1()));
        assert_eq!(
            plan.statements(),
            vec!["ALTER TABLE \"evolving\" DROP COLUMN \"field2\""]
        );
    }

    #[test]
    fn test_type_change_recreates() {
        let model = descriptor(
            EntityMapping::table("evolving")
                .field(FieldMapping::new("field1", "i32"))
                .field(FieldMapping::new("field2", "String"))
                .field(FieldMapping::new("field3", "String")),
        );
        let plan = plan_table_migration(&SqliteDialect::new(), &model, Some(&live_v1()));
        let MigrationPlan::Recreate(recreate) = &plan else {
            panic!("expected recreate, got {plan:?}");
        };
        let create = recreate.statements(RecreateStep::CreateNew);
        assert_eq!(create.len(), 1);
        assert!(create[0].contains("\"field3\" TEXT"));
    }

    #[test]
    fn test_recreate_fills_new_not_null_columns() {
        let model = descriptor(
            v1()
                .field(FieldMapping::new("field4", "i32").unique())
                .field(FieldMapping::new("field5", "Option<i32>")),
        );
        let plan = plan_table_migration(&SqliteDialect::new(), &model, Some(&live_v1()));
        let MigrationPlan::Recreate(recreate) = &plan else {
            panic!("expected recreate, got {plan:?}");
        };
        assert_eq!(
            recreate.statements(RecreateStep::CopyData),
            ["INSERT INTO \"evolving\" (\"field1\", \"field2\", \"field3\", \"field4\") SELECT \"field1\", \"field2\", \"field3\", 0 FROM \"__tabula_tmp_evolving\""]
        );
    }

    #[test]
    fn test_recreate_coalesces_newly_not_null_columns() {
        let model = descriptor(
            EntityMapping::table("evolving")
                .field(FieldMapping::new("field1", "i32"))
                .field(FieldMapping::new("field2", "String").not_null())
                .field(FieldMapping::new("field3", "bool").index()),
        );
        let plan = plan_table_migration(&SqliteDialect::new(), &model, Some(&live_v1()));
        let MigrationPlan::Recreate(recreate) = &plan else {
            panic!("expected recreate, got {plan:?}");
        };
        assert!(recreate.statements(RecreateStep::CopyData)[0]
            .contains("COALESCE(\"field2\", '')"));
    }

    #[test]
    fn test_recreate_steps_walk_in_order() {
        let model = descriptor(
            EntityMapping::table("evolving")
                .field(FieldMapping::new("field1", "i32"))
                .field(FieldMapping::new("field2", "String")),
        );
        let plan = plan_table_migration(&SqliteDialect::new(), &model, Some(&live_v1()));
        let MigrationPlan::Recreate(recreate) = &plan else {
            panic!("expected recreate, got {plan:?}");
        };
        let steps: Vec<_> = recreate.steps().map(|(step, _)| step).collect();
        assert_eq!(
            steps,
            vec![
                RecreateStep::Rename,
                RecreateStep::CreateNew,
                RecreateStep::CopyData,
                RecreateStep::DropOld,
            ]
        );
    }

    #[test]
    fn test_postgres_alters_in_place() {
        let mut live = live_v1();
        live.columns[2].native_type = String::from("BOOLEAN");
        live.columns[1].native_type = String::from("character varying(20)");
        let model = descriptor(
            EntityMapping::table("evolving")
                .field(FieldMapping::new("field1", "i64"))
                .field(FieldMapping::new("field2", "String"))
                .field(FieldMapping::new("field3", "bool").index()),
        );
        let plan = plan_table_migration(&PostgresDialect::new(), &model, Some(&live));
        assert_eq!(plan.kind(), "in-place");
        assert_eq!(
            plan.statements(),
            vec![
                "ALTER TABLE \"evolving\" ALTER COLUMN \"field1\" TYPE BIGINT USING \"field1\"::BIGINT",
                "ALTER TABLE \"evolving\" ALTER COLUMN \"field1\" SET NOT NULL",
            ]
        );
    }

    #[test]
    fn test_view_plans() {
        let model = descriptor(EntityMapping::view(
            "adults",
            "SELECT id, name FROM people WHERE age >= 18",
        ));
        let dialect = SqliteDialect::new();

        let create = plan_view_migration(&dialect, &model, None);
        assert_eq!(
            create.statements(),
            vec!["CREATE VIEW \"adults\" AS SELECT id, name FROM people WHERE age >= 18"]
        );

        let same = ViewDescriptor {
            name: String::from("adults"),
            definition: String::from("SELECT \"id\",\n  \"name\" FROM people WHERE age>=18"),
        };
        assert!(plan_view_migration(&dialect, &model, Some(&same)).is_noop());

        let changed = ViewDescriptor {
            name: String::from("adults"),
            definition: String::from("SELECT id, name FROM people WHERE age >= 21"),
        };
        assert_eq!(
            plan_view_migration(&dialect, &model, Some(&changed)).statements(),
            vec![
                "DROP VIEW IF EXISTS \"adults\"",
                "CREATE VIEW \"adults\" AS SELECT id, name FROM people WHERE age >= 18",
            ]
        );
    }

    #[test]
    fn test_definition_hash_ignores_layout_and_quoting() {
        let plain = definition_hash("SELECT id, name FROM people WHERE age >= 18");
        assert_eq!(
            plain,
            definition_hash("SELECT \"id\",\n\t\"name\"\nFROM [people]\nWHERE age>=18")
        );
        assert_eq!(
            plain,
            definition_hash("  SELECT `id`,`name` FROM people WHERE age >= 18;  ")
        );
        assert_ne!(
            definition_hash("SELECT id FROM people WHERE name = 'Ann'"),
            definition_hash("SELECT id FROM people WHERE name = 'ann'")
        );
    }

    #[test]
    fn test_view_body_case_change_replaces_view() {
        let model = descriptor(EntityMapping::view(
            "anns",
            "SELECT id FROM people WHERE name = 'Ann'",
        ));
        let live = ViewDescriptor {
            name: String::from("anns"),
            definition: String::from("SELECT id FROM people WHERE name = 'ann'"),
        };
        let plan = plan_view_migration(&SqliteDialect::new(), &model, Some(&live));
        assert_eq!(plan.kind(), "replace-view");
    }

    #[test]
    fn test_key_column_declared_unique_is_noop() {
        let mut live = live_v1();
        live.columns[0].primary_key = true;
        let model = descriptor(
            EntityMapping::table("evolving")
                .field(FieldMapping::new("field1", "i32").primary_key().unique())
                .field(FieldMapping::new("field2", "String"))
                .field(FieldMapping::new("field3", "bool").index()),
        );
        let plan = plan_table_migration(&SqliteDialect::new(), &model, Some(&live));
        assert!(plan.is_noop(), "got {plan:?}");
    }

    #[test]
    fn test_obsolete_unique_stays_in_place() {
        let mut live = live_v1();
        live.uniques.push(UniqueDescriptor {
            name: Some(String::from("pair")),
            columns: vec![String::from("field1"), String::from("field2")],
        });
        let model = descriptor(v1().field(FieldMapping::new("field4", "Option<i32>")));
        let plan = plan_table_migration(&SqliteDialect::new(), &model, Some(&live));
        let MigrationPlan::InPlace { diff, statements } = &plan else {
            panic!("expected in-place, got {plan:?}");
        };
        assert_eq!(diff.obsolete_uniques.len(), 1);
        assert_eq!(
            statements,
            &["ALTER TABLE \"evolving\" ADD COLUMN \"field4\" INTEGER"]
        );

        // Nothing else to do once the column exists.
        let model = descriptor(v1());
        assert!(plan_table_migration(&SqliteDialect::new(), &model, Some(&live)).is_noop());
    }
}
