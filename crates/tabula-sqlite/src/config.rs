//! Client configuration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteConnectOptions;

use crate::error::{ClientError, Result};

/// Options for [`SqliteClient::connect`](crate::SqliteClient::connect).
///
/// Every field has a default, so a JSON config only needs the keys it
/// changes:
///
/// ```rust
/// use tabula_sqlite::ClientOptions;
///
/// let options = ClientOptions::from_json(r#"{ "url": "sqlite:app.db", "command_timeout_ms": 500 }"#).unwrap();
/// assert_eq!(options.url, "sqlite:app.db");
/// assert!(options.create_if_missing);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Database URL, e.g. `sqlite:app.db` or `sqlite::memory:`.
    pub url: String,
    /// Create the database file when it does not exist.
    pub create_if_missing: bool,
    /// How long to wait for the connection, in seconds.
    pub acquire_timeout_secs: u64,
    /// Per-statement timeout in milliseconds; disabled when `None`.
    pub command_timeout_ms: Option<u64>,
    /// Resolve filter properties ignoring ASCII case.
    pub case_insensitive_properties: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            url: String::from("sqlite::memory:"),
            create_if_missing: true,
            acquire_timeout_secs: 30,
            command_timeout_ms: None,
            case_insensitive_properties: false,
        }
    }
}

impl ClientOptions {
    /// Default options for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sets whether a missing database file is created.
    #[must_use]
    pub const fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Sets the connection acquire timeout (whole seconds).
    #[must_use]
    pub const fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_secs = timeout.as_secs();
        self
    }

    /// Enables the per-statement timeout.
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Sets case-insensitive property resolution.
    #[must_use]
    pub const fn case_insensitive_properties(mut self, enabled: bool) -> Self {
        self.case_insensitive_properties = enabled;
        self
    }

    /// Parses options from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] on malformed JSON or unknown value
    /// types.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Reads JSON options from a file.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the file cannot be read or
    /// parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Connection acquire timeout.
    #[must_use]
    pub const fn acquire_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Per-statement timeout, when enabled.
    #[must_use]
    pub fn command_timeout_duration(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&self.url)
            .map_err(|e| ClientError::Config(format!("invalid database url '{}': {e}", self.url)))?;
        Ok(options.create_if_missing(self.create_if_missing))
    }
}
