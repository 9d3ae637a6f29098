//! SQLite client for tabula.
//!
//! `tabula-sqlite` runs what `tabula-core` renders:
//! - **Client** - owns one connection; binds prepared operations into
//!   executables and offers entity insert, update, delete, load and count
//! - **Executables** - affected-row count, scalar or lazy row stream, each
//!   on the connection or inside an explicit transaction
//! - **Transactions** - exclusive use of the connection, rolled back when
//!   dropped uncommitted
//! - **Introspection** - table and view snapshots read from the catalog
//! - **Schema updates** - introspect, diff and migrate in one transaction
//! - **Blocking client** - the same surface for synchronous callers
//!
//! # Example
//!
//! ```rust
//! use tabula_core::entity::{Entity, EntityMapping, FieldMapping};
//! use tabula_core::SqlValue;
//! use tabula_sqlite::{ClientOptions, SqliteClient};
//!
//! struct Tag {
//!     id: i64,
//!     label: String,
//! }
//!
//! impl Entity for Tag {
//!     fn mapping() -> EntityMapping {
//!         EntityMapping::table("tags")
//!             .field(FieldMapping::new("id", "i64").primary_key().autoincrement())
//!             .field(FieldMapping::new("label", "String"))
//!     }
//!
//!     fn to_values(&self) -> Vec<(&'static str, SqlValue)> {
//!         vec![
//!             ("id", SqlValue::Int(self.id)),
//!             ("label", SqlValue::Text(self.label.clone())),
//!         ]
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let client = SqliteClient::connect(ClientOptions::default()).await?;
//! client.update_schema::<Tag>().await?;
//! client.insert(&Tag { id: 0, label: String::from("rust") }).await?;
//! assert_eq!(client.count::<Tag>(None).await?, 1);
//!
//! // A second update finds nothing to do.
//! assert!(client.update_schema::<Tag>().await?.is_noop());
//! # Ok::<(), tabula_sqlite::ClientError>(())
//! # }).unwrap();
//! ```

pub mod blocking;
pub mod client;
pub mod config;
pub mod error;
pub mod executable;
mod introspect;
pub mod migrate;
pub mod transaction;
pub mod value;

pub use blocking::{BlockingClient, BlockingTransaction, Rows};
pub use client::SqliteClient;
pub use config::ClientOptions;
pub use error::{ClientError, Result};
pub use executable::Executable;
pub use migrate::MigrationOutcome;
pub use transaction::Transaction;
pub use value::{decode_column, decode_row};
