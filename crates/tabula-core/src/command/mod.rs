//! Statement builders for entities.
//!
//! [`EntityCommands`] covers the per-row commands (insert, update, delete)
//! plus load and count; [`SelectQuery`] is the general SELECT builder they
//! share.

mod entity;
mod select;

pub use entity::EntityCommands;
pub use select::SelectQuery;
