//! Synchronous wrapper around [`SqliteClient`].

use std::fmt;

use futures::stream::{BoxStream, StreamExt};
use sqlx::sqlite::SqliteRow;
use tabula_core::{Entity, SchemaDescriptor, SqlValue};
use tokio::runtime::{Builder, Runtime};

use crate::client::SqliteClient;
use crate::config::ClientOptions;
use crate::error::{ClientError, Result};
use crate::executable::Executable;
use crate::migrate::MigrationOutcome;
use crate::transaction::Transaction;

/// A client that blocks the calling thread.
///
/// Owns a current-thread runtime that drives the asynchronous client.
/// Must not be used from inside another async runtime.
///
/// ```rust
/// use tabula_core::SqlValue;
/// use tabula_sqlite::{BlockingClient, ClientOptions};
///
/// let client = BlockingClient::connect(ClientOptions::default()).unwrap();
/// let one = client.scalar(&client.client().raw("SELECT 1", Vec::new())).unwrap();
/// assert_eq!(one, SqlValue::Int(1));
/// ```
pub struct BlockingClient {
    client: SqliteClient,
    runtime: Runtime,
}

impl fmt::Debug for BlockingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingClient")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl BlockingClient {
    /// Opens the database described by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the runtime cannot be built and
    /// the connection error of [`SqliteClient::connect`].
    pub fn connect(options: ClientOptions) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ClientError::Config(format!("cannot start runtime: {e}")))?;
        let client = runtime.block_on(SqliteClient::connect(options))?;
        Ok(Self { client, runtime })
    }

    /// The wrapped asynchronous client, for building executables.
    #[must_use]
    pub const fn client(&self) -> &SqliteClient {
        &self.client
    }

    /// See [`Executable::execute`].
    ///
    /// # Errors
    ///
    /// Same as [`Executable::execute`].
    pub fn execute(&self, executable: &Executable) -> Result<u64> {
        self.runtime.block_on(executable.execute())
    }

    /// See [`Executable::execute_in`].
    ///
    /// # Errors
    ///
    /// Same as [`Executable::execute`].
    pub fn execute_in(&self, executable: &Executable, transaction: &mut BlockingTransaction<'_>) -> Result<u64> {
        let inner = transaction.inner()?;
        self.runtime.block_on(executable.execute_in(inner))
    }

    /// See [`Executable::scalar`].
    ///
    /// # Errors
    ///
    /// Same as [`Executable::execute`].
    pub fn scalar(&self, executable: &Executable) -> Result<SqlValue> {
        self.runtime.block_on(executable.scalar())
    }

    /// See [`Executable::scalar_in`].
    ///
    /// # Errors
    ///
    /// Same as [`Executable::execute`].
    pub fn scalar_in(
        &self,
        executable: &Executable,
        transaction: &mut BlockingTransaction<'_>,
    ) -> Result<SqlValue> {
        let inner = transaction.inner()?;
        self.runtime.block_on(executable.scalar_in(inner))
    }

    /// Lazily iterates the result rows; each `next` reads one row.
    pub fn rows<'a>(&'a self, executable: &'a Executable) -> Rows<'a> {
        Rows {
            runtime: &self.runtime,
            stream: Some(executable.fetch()),
        }
    }

    /// [`rows`](Self::rows) inside `transaction`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the transaction already ended.
    pub fn rows_in<'a>(
        &'a self,
        executable: &'a Executable,
        transaction: &'a mut BlockingTransaction<'_>,
    ) -> Result<Rows<'a>> {
        let inner = transaction.inner()?;
        Ok(Rows {
            runtime: &self.runtime,
            stream: Some(executable.fetch_in(inner)),
        })
    }

    /// Starts a transaction that rolls back when dropped uncommitted.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn begin(&self) -> Result<BlockingTransaction<'_>> {
        let inner = self.runtime.block_on(self.client.begin())?;
        Ok(BlockingTransaction {
            runtime: &self.runtime,
            inner: Some(inner),
        })
    }

    /// See [`SqliteClient::table_exists`].
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        self.runtime.block_on(self.client.table_exists(name))
    }

    /// See [`SqliteClient::schema`].
    ///
    /// # Errors
    ///
    /// Same as [`SqliteClient::schema`].
    pub fn schema(&self, name: &str) -> Result<Option<SchemaDescriptor>> {
        self.runtime.block_on(self.client.schema(name))
    }

    /// See [`SqliteClient::update_schema`].
    ///
    /// # Errors
    ///
    /// Same as [`SqliteClient::update_schema`].
    pub fn update_schema<E: Entity>(&self) -> Result<MigrationOutcome> {
        self.runtime.block_on(self.client.update_schema::<E>())
    }

    /// See [`SqliteClient::insert`].
    ///
    /// # Errors
    ///
    /// Same as [`SqliteClient::insert`].
    pub fn insert<E: Entity>(&self, entity: &E) -> Result<u64> {
        self.runtime.block_on(self.client.insert(entity))
    }

    /// See [`SqliteClient::count`].
    ///
    /// # Errors
    ///
    /// Same as [`SqliteClient::count`].
    pub fn count<E: Entity>(&self, filter: Option<&tabula_core::Expr>) -> Result<i64> {
        self.runtime.block_on(self.client.count::<E>(filter))
    }
}

/// A transaction of a [`BlockingClient`].
pub struct BlockingTransaction<'a> {
    runtime: &'a Runtime,
    inner: Option<Transaction>,
}

impl fmt::Debug for BlockingTransaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingTransaction")
            .field("active", &self.inner.is_some())
            .finish_non_exhaustive()
    }
}

impl BlockingTransaction<'_> {
    fn inner(&mut self) -> Result<&mut Transaction> {
        self.inner
            .as_mut()
            .ok_or_else(|| ClientError::Config(String::from("transaction already ended")))
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn commit(mut self) -> Result<()> {
        match self.inner.take() {
            Some(inner) => self.runtime.block_on(inner.commit()),
            None => Ok(()),
        }
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn rollback(mut self) -> Result<()> {
        match self.inner.take() {
            Some(inner) => self.runtime.block_on(inner.rollback()),
            None => Ok(()),
        }
    }
}

impl Drop for BlockingTransaction<'_> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            // Queues the rollback; it completes the next time the runtime
            // is driven.
            let _entered = self.runtime.enter();
            drop(inner);
        }
    }
}

/// Lazy row iterator returned by [`BlockingClient::rows`].
pub struct Rows<'a> {
    runtime: &'a Runtime,
    stream: Option<BoxStream<'a, Result<SqliteRow>>>,
}

impl fmt::Debug for Rows<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("open", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl Iterator for Rows<'_> {
    type Item = Result<SqliteRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let stream = self.stream.as_mut()?;
        let item = self.runtime.block_on(stream.next());
        if item.is_none() {
            self.close();
        }
        item
    }
}

impl Rows<'_> {
    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _entered = self.runtime.enter();
            drop(stream);
        }
    }
}

impl Drop for Rows<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
