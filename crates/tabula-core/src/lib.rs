//! # tabula-core
//!
//! Entity mapping, SQL generation and schema migration planning, without
//! any I/O.
//!
//! This crate provides:
//! - Canonical entity descriptors built from a declarative mapping
//! - A typed expression DSL compiled into a token tree and rendered with
//!   operator-precedence-aware parenthesization
//! - Reusable, dialect-bound prepared operations with scalar and
//!   array-sized parameter slots
//! - SQLite, PostgreSQL and SQL Server dialects
//! - A schema differ and migration planner (no-op, in-place or recreate)
//!
//! ## Compiling expressions
//!
//! ```rust
//! use std::sync::Arc;
//! use tabula_core::compiler::{CompileOptions, ExpressionCompiler};
//! use tabula_core::dialect::SqliteDialect;
//! use tabula_core::entity::{EntityDescriptor, EntityMapping, FieldMapping};
//! use tabula_core::expr::prop;
//!
//! let users = EntityDescriptor::build(
//!     &EntityMapping::table("users")
//!         .field(FieldMapping::new("id", "i64").primary_key().autoincrement())
//!         .field(FieldMapping::new("name", "String")),
//! )
//! .unwrap();
//!
//! let op = ExpressionCompiler::new(&users, CompileOptions::new())
//!     .prepare(&prop("name").eq("'; DROP TABLE users; --"), Arc::new(SqliteDialect::new()))
//!     .unwrap();
//!
//! // Values never reach the SQL text.
//! assert_eq!(op.sql(), Some(r#""name" = ?"#));
//! ```
//!
//! ## Planning migrations
//!
//! ```rust
//! use tabula_core::dialect::SqliteDialect;
//! use tabula_core::entity::{EntityDescriptor, EntityMapping, FieldMapping};
//! use tabula_core::migration::{plan_table_migration, MigrationPlan};
//!
//! let model = EntityDescriptor::build(
//!     &EntityMapping::table("users").field(FieldMapping::new("id", "i64").primary_key()),
//! )
//! .unwrap();
//!
//! // No live table yet: the plan creates it.
//! let plan = plan_table_migration(&SqliteDialect::new(), &model, None);
//! assert!(matches!(plan, MigrationPlan::CreateTable(_)));
//! ```

pub mod command;
pub mod compiler;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod expr;
pub mod migration;
pub mod operation;
pub mod schema;
pub mod token;
pub mod types;
pub mod value;

pub use command::{EntityCommands, SelectQuery};
pub use compiler::{CompileOptions, ExpressionCompiler};
pub use dialect::{Dialect, MsSqlDialect, PostgresDialect, SqliteDialect};
pub use entity::{DescriptorCache, Entity, EntityDescriptor, EntityMapping, FieldMapping};
pub use error::{Error, Result};
pub use expr::Expr;
pub use migration::{MigrationPlan, SchemaDiff};
pub use operation::{Arg, OperationBuilder, PreparedOperation, Statement};
pub use schema::{SchemaDescriptor, TableDescriptor, ViewDescriptor};
pub use token::Token;
pub use types::CanonicalType;
pub use value::{DefaultValue, SqlValue, ToSqlValue};
