//! Error types for the SQLite client.

use std::time::Duration;

use tabula_core::SqlValue;

/// Errors raised while talking to the database.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A statement failed in the driver.
    #[error("Statement failed: {source}\n  sql: {sql}\n  params: {params:?}")]
    Statement {
        /// The SQL text sent to the driver.
        sql: String,
        /// Bound parameters in marker order.
        params: Vec<SqlValue>,
        /// The driver error.
        source: sqlx::Error,
    },

    /// Connection-level database error (connect, begin, commit, ...).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A statement exceeded the configured command timeout.
    #[error("Statement timed out after {timeout:?}: {sql}")]
    Timeout {
        /// The SQL text that timed out.
        sql: String,
        /// The configured limit.
        timeout: Duration,
    },

    /// A query returned a value of the wrong kind.
    #[error("Expected {expected} from query, got {value:?}\n  sql: {sql}")]
    UnexpectedValue {
        /// The SQL text that produced the value.
        sql: String,
        /// What the caller expected.
        expected: &'static str,
        /// What the database returned.
        value: SqlValue,
    },

    /// The live object is a table where the model wants a view, or the
    /// reverse.
    #[error("'{name}' exists as a {live} but is mapped as a {model}")]
    KindConflict {
        /// Object name.
        name: String,
        /// What the database holds.
        live: &'static str,
        /// What the model declares.
        model: &'static str,
    },

    /// Mapping, compilation or planning error.
    #[error(transparent)]
    Core(#[from] tabula_core::Error),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn statement(statement: &tabula_core::Statement, source: sqlx::Error) -> Self {
        Self::Statement {
            sql: statement.sql.clone(),
            params: statement.params.clone(),
            source,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
