//! Explicit transactions.

use std::fmt;
use std::time::Duration;

use sqlx::sqlite::{Sqlite, SqliteConnection};
use tabula_core::Statement;
use tracing::debug;

use crate::error::Result;
use crate::executable::execute_on;

/// A transaction holding the client's only connection.
///
/// While it is alive no other statement of the same client can run.
/// Dropping it without [`commit`](Self::commit) rolls back.
pub struct Transaction {
    inner: sqlx::Transaction<'static, Sqlite>,
    timeout: Option<Duration>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Transaction {
    pub(crate) fn new(inner: sqlx::Transaction<'static, Sqlite>, timeout: Option<Duration>) -> Self {
        Self { inner, timeout }
    }

    /// Commits every statement executed in the transaction.
    ///
    /// # Errors
    ///
    /// Returns the driver error; the transaction is rolled back in that case.
    pub async fn commit(self) -> Result<()> {
        self.inner.commit().await?;
        debug!("Transaction committed");
        Ok(())
    }

    /// Discards every statement executed in the transaction.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn rollback(self) -> Result<()> {
        self.inner.rollback().await?;
        debug!("Transaction rolled back");
        Ok(())
    }

    pub(crate) fn connection(&mut self) -> &mut SqliteConnection {
        &mut *self.inner
    }

    pub(crate) const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs parameterless SQL, typically DDL.
    pub(crate) async fn execute_sql(&mut self, sql: &str) -> Result<u64> {
        let statement = Statement {
            sql: sql.to_string(),
            params: Vec::new(),
        };
        let timeout = self.timeout;
        execute_on(self.connection(), &statement, timeout).await
    }
}
