//! Rendered statements bound to a client.

use std::future::Future;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::Executor;
use tabula_core::{SqlValue, Statement};
use tracing::{debug, error};

use crate::error::{ClientError, Result};
use crate::transaction::Transaction;
use crate::value::{bind_statement, decode_column};

/// A statement ready to run against its client.
///
/// Each way of running it comes in two forms: on the client's connection
/// directly, or inside an explicit [`Transaction`] (the `_in` variants).
#[derive(Debug, Clone)]
pub struct Executable {
    pool: SqlitePool,
    statement: Statement,
    timeout: Option<Duration>,
}

impl Executable {
    pub(crate) fn new(pool: SqlitePool, statement: Statement, timeout: Option<Duration>) -> Self {
        Self {
            pool,
            statement,
            timeout,
        }
    }

    /// The rendered statement.
    #[must_use]
    pub const fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Runs the statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Statement`] when the driver rejects the
    /// statement and [`ClientError::Timeout`] when the command timeout
    /// elapses.
    pub async fn execute(&self) -> Result<u64> {
        execute_on(&self.pool, &self.statement, self.timeout).await
    }

    /// [`execute`](Self::execute) inside `transaction`.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub async fn execute_in(&self, transaction: &mut Transaction) -> Result<u64> {
        let timeout = self.timeout.or(transaction.timeout());
        execute_on(transaction.connection(), &self.statement, timeout).await
    }

    /// Runs the statement and returns the first column of the first row,
    /// or [`SqlValue::Null`] when there is no row.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub async fn scalar(&self) -> Result<SqlValue> {
        scalar_on(&self.pool, &self.statement, self.timeout).await
    }

    /// [`scalar`](Self::scalar) inside `transaction`.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub async fn scalar_in(&self, transaction: &mut Transaction) -> Result<SqlValue> {
        let timeout = self.timeout.or(transaction.timeout());
        scalar_on(transaction.connection(), &self.statement, timeout).await
    }

    /// Lazily streams the result rows.
    ///
    /// Rows are read from the database as the stream is polled. The
    /// command timeout does not apply to streams.
    pub fn fetch(&self) -> BoxStream<'_, Result<SqliteRow>> {
        fetch_on(&self.pool, &self.statement)
    }

    /// [`fetch`](Self::fetch) inside `transaction`.
    pub fn fetch_in<'a>(&'a self, transaction: &'a mut Transaction) -> BoxStream<'a, Result<SqliteRow>> {
        fetch_on(transaction.connection(), &self.statement)
    }

    /// Collects every result row.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub async fn fetch_all(&self) -> Result<Vec<SqliteRow>> {
        self.fetch().try_collect().await
    }
}

pub(crate) async fn execute_on<'e, X>(
    executor: X,
    statement: &Statement,
    timeout: Option<Duration>,
) -> Result<u64>
where
    X: Executor<'e, Database = Sqlite>,
{
    debug!(sql = %statement.sql, params = statement.params.len(), "Executing statement");
    let result = limited(statement, timeout, bind_statement(statement).execute(executor)).await?;
    Ok(result.rows_affected())
}

async fn scalar_on<'e, X>(executor: X, statement: &Statement, timeout: Option<Duration>) -> Result<SqlValue>
where
    X: Executor<'e, Database = Sqlite>,
{
    debug!(sql = %statement.sql, params = statement.params.len(), "Executing scalar");
    let row = limited(
        statement,
        timeout,
        bind_statement(statement).fetch_optional(executor),
    )
    .await?;
    match row {
        Some(row) => decode_column(&row, 0).map_err(|e| ClientError::statement(statement, e)),
        None => Ok(SqlValue::Null),
    }
}

fn fetch_on<'a, X>(executor: X, statement: &'a Statement) -> BoxStream<'a, Result<SqliteRow>>
where
    X: Executor<'a, Database = Sqlite> + 'a,
{
    debug!(sql = %statement.sql, params = statement.params.len(), "Opening reader");
    bind_statement(statement)
        .fetch(executor)
        .map(move |row| row.map_err(|e| failed(statement, e)))
        .boxed()
}

async fn limited<T, F>(statement: &Statement, timeout: Option<Duration>, future: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(sql = %statement.sql, timeout = ?limit, "Statement timed out");
                return Err(ClientError::Timeout {
                    sql: statement.sql.clone(),
                    timeout: limit,
                });
            }
        },
        None => future.await,
    };
    outcome.map_err(|e| failed(statement, e))
}

fn failed(statement: &Statement, source: sqlx::Error) -> ClientError {
    error!(sql = %statement.sql, error = %source, "Statement failed");
    ClientError::statement(statement, source)
}
