//! The asynchronous SQLite client.

use std::sync::Arc;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tabula_core::dialect::{Dialect, SqliteDialect};
use tabula_core::{
    Arg, CompileOptions, DescriptorCache, Entity, EntityCommands, EntityDescriptor, Expr,
    ExpressionCompiler, PreparedOperation, SchemaDescriptor, SelectQuery, SqlValue, Statement,
    ToSqlValue,
};
use tracing::{debug, info, warn};

use crate::config::ClientOptions;
use crate::error::{ClientError, Result};
use crate::executable::Executable;
use crate::introspect;
use crate::transaction::Transaction;

/// A client owning one SQLite connection.
///
/// The connection sits in a pool of size one, so concurrent callers on
/// the same client take turns and a [`Transaction`] excludes every other
/// statement until it ends. Clones share the connection and the
/// descriptor cache.
#[derive(Debug, Clone)]
pub struct SqliteClient {
    pool: SqlitePool,
    dialect: Arc<SqliteDialect>,
    descriptors: Arc<DescriptorCache>,
    options: Arc<ClientOptions>,
}

impl SqliteClient {
    /// Opens the database described by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`](crate::ClientError::Config) for an
    /// unparseable URL and the driver error when the database cannot be
    /// opened.
    pub async fn connect(options: ClientOptions) -> Result<Self> {
        let connect_options = options.connect_options()?;
        // An in-memory database lives exactly as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(options.acquire_timeout_duration())
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await?;
        info!(url = %options.url, "Connected to database");

        Ok(Self {
            pool,
            dialect: Arc::new(SqliteDialect::new()),
            descriptors: Arc::new(DescriptorCache::new()),
            options: Arc::new(options),
        })
    }

    /// Opens `url` with default options.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect).
    pub async fn open(url: &str) -> Result<Self> {
        Self::connect(ClientOptions::new(url)).await
    }

    /// The options the client was opened with.
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The underlying single-connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The SQLite dialect.
    #[must_use]
    pub fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::clone(&self.dialect) as Arc<dyn Dialect>
    }

    /// Descriptor for `E`, built on first use.
    ///
    /// # Errors
    ///
    /// Returns the model validation error.
    pub fn descriptor<E: Entity>(&self) -> Result<Arc<EntityDescriptor>> {
        Ok(self.descriptors.get::<E>()?)
    }

    /// Command builders for `E`.
    ///
    /// # Errors
    ///
    /// Returns the model validation error.
    pub fn commands<E: Entity>(&self) -> Result<EntityCommands> {
        Ok(EntityCommands::new(self.descriptor::<E>()?, self.dialect())
            .case_insensitive(self.options.case_insensitive_properties))
    }

    /// A SELECT over `E`.
    ///
    /// # Errors
    ///
    /// Returns the model validation error.
    pub fn select<E: Entity>(&self) -> Result<SelectQuery> {
        Ok(self.commands::<E>()?.select())
    }

    /// Compiles a filter expression against `E` into a prepared fragment.
    ///
    /// # Errors
    ///
    /// Returns the model or compilation error.
    pub fn compile<E: Entity>(&self, expr: &Expr) -> Result<PreparedOperation> {
        let descriptor = self.descriptor::<E>()?;
        let options = CompileOptions::new().case_insensitive(self.options.case_insensitive_properties);
        Ok(ExpressionCompiler::new(&descriptor, options).prepare(expr, self.dialect())?)
    }

    /// Renders `operation` with `args` and binds it to this client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentMismatch`](tabula_core::Error::ArgumentMismatch)
    /// when `args` do not fit the operation's slots.
    pub fn bind(&self, operation: &PreparedOperation, args: &[Arg]) -> Result<Executable> {
        Ok(self.executable(operation.statement(args)?))
    }

    /// Binds hand-written SQL and parameters to this client.
    #[must_use]
    pub fn raw(&self, sql: impl Into<String>, params: Vec<SqlValue>) -> Executable {
        self.executable(Statement {
            sql: sql.into(),
            params,
        })
    }

    fn executable(&self, statement: Statement) -> Executable {
        Executable::new(
            self.pool.clone(),
            statement,
            self.options.command_timeout_duration(),
        )
    }

    /// Starts a transaction, waiting for the connection if it is busy.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn begin(&self) -> Result<Transaction> {
        let inner = self.pool.begin().await?;
        debug!("Transaction started");
        Ok(Transaction::new(inner, self.options.command_timeout_duration()))
    }

    /// Whether a table named `name` exists.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        introspect::table_exists(&mut conn, &self.dialect, name).await
    }

    /// Snapshot of the table or view named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSchemaKind`](tabula_core::Error::UnknownSchemaKind)
    /// when `name` is some other kind of object, such as an index.
    pub async fn schema(&self, name: &str) -> Result<Option<SchemaDescriptor>> {
        let mut conn = self.pool.acquire().await?;
        introspect::describe(&mut conn, &self.dialect, name).await
    }

    /// Drops a table if it exists.
    ///
    /// # Errors
    ///
    /// Returns the statement error.
    pub async fn drop_table(&self, name: &str) -> Result<()> {
        warn!(table = %name, "Dropping table");
        self.raw(self.dialect.drop_table(name), Vec::new()).execute().await?;
        Ok(())
    }

    /// Drops a view if it exists.
    ///
    /// # Errors
    ///
    /// Returns the statement error.
    pub async fn drop_view(&self, name: &str) -> Result<()> {
        info!(view = %name, "Dropping view");
        self.raw(self.dialect.drop_view(name), Vec::new()).execute().await?;
        Ok(())
    }

    /// Deletes every row of `table` and returns how many were removed.
    ///
    /// With `reset_sequence` the autoincrement counter starts over. SQLite
    /// only keeps counters once some table uses `AUTOINCREMENT`; without
    /// any, the reset is skipped.
    ///
    /// # Errors
    ///
    /// Returns the statement error; nothing is deleted in that case.
    pub async fn truncate(&self, table: &str, reset_sequence: bool) -> Result<u64> {
        let mut statements = self.dialect.truncate(table, reset_sequence);
        if reset_sequence && !self.table_exists("sqlite_sequence").await? {
            warn!(table = %table, "No autoincrement counters to reset");
            statements.truncate(1);
        }

        let mut transaction = self.begin().await?;
        let mut deleted = 0;
        for (i, sql) in statements.iter().enumerate() {
            let affected = transaction.execute_sql(sql).await?;
            if i == 0 {
                deleted = affected;
            }
        }
        transaction.commit().await?;
        info!(table = %table, rows = deleted, "Table truncated");
        Ok(deleted)
    }

    /// Inserts one entity.
    ///
    /// # Errors
    ///
    /// Returns the command or statement error.
    pub async fn insert<E: Entity>(&self, entity: &E) -> Result<u64> {
        let commands = self.commands::<E>()?;
        let args = commands.insert_args(entity);
        self.bind(&commands.insert()?, &args)?.execute().await
    }

    /// Updates one entity by primary key.
    ///
    /// # Errors
    ///
    /// Returns the command or statement error.
    pub async fn update<E: Entity>(&self, entity: &E) -> Result<u64> {
        let commands = self.commands::<E>()?;
        let args = commands.update_args(entity);
        self.bind(&commands.update()?, &args)?.execute().await
    }

    /// Deletes one entity by primary key.
    ///
    /// # Errors
    ///
    /// Returns the command or statement error.
    pub async fn delete<E: Entity>(&self, entity: &E) -> Result<u64> {
        let commands = self.commands::<E>()?;
        let args = commands.delete_args(entity);
        self.bind(&commands.delete()?, &args)?.execute().await
    }

    /// Deletes every row whose primary key is in `keys`.
    ///
    /// # Errors
    ///
    /// Returns the command or statement error.
    pub async fn delete_many<E, K>(&self, keys: impl IntoIterator<Item = K>) -> Result<u64>
    where
        E: Entity,
        K: ToSqlValue,
    {
        let commands = self.commands::<E>()?;
        self.bind(&commands.delete_many()?, &[Arg::array(keys)])?
            .execute()
            .await
    }

    /// Loads the rows of `E` matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns the compilation or statement error.
    pub async fn load<E: Entity>(&self, filter: Option<Expr>) -> Result<Vec<SqliteRow>> {
        let operation = self.commands::<E>()?.load(filter)?;
        self.bind(&operation, &[])?.fetch_all().await
    }

    /// Counts the rows of `E` matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns the compilation or statement error, or
    /// [`ClientError::UnexpectedValue`] when the count is not an integer.
    pub async fn count<E: Entity>(&self, filter: Option<&Expr>) -> Result<i64> {
        let operation = self.commands::<E>()?.count(filter)?;
        let executable = self.bind(&operation, &[])?;
        let value = executable.scalar().await?;
        row_count(&executable.statement().sql, value)
    }
}

fn row_count(sql: &str, value: SqlValue) -> Result<i64> {
    match value {
        SqlValue::Int(n) => Ok(n),
        value => Err(ClientError::UnexpectedValue {
            sql: sql.to_string(),
            expected: "an integer count",
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_count_accepts_integers() {
        assert_eq!(row_count("SELECT COUNT(*) FROM \"t\"", SqlValue::Int(4)).unwrap(), 4);
    }

    #[test]
    fn test_row_count_rejects_other_values() {
        for value in [SqlValue::Null, SqlValue::Text(String::from("4")), SqlValue::Float(4.0)] {
            let err = row_count("SELECT COUNT(*) FROM \"t\"", value.clone()).unwrap_err();
            match err {
                ClientError::UnexpectedValue { sql, value: got, .. } => {
                    assert_eq!(sql, "SELECT COUNT(*) FROM \"t\"");
                    assert_eq!(got, value);
                }
                other => panic!("expected unexpected value, got {other:?}"),
            }
        }
    }
}
