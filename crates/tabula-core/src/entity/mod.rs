//! Entity mapping model.
//!
//! [`EntityMapping`] is the declarative input (usually generated by
//! `#[derive(Entity)]`), [`EntityDescriptor`] the canonical, validated
//! metadata every other module works from, and [`DescriptorCache`] the
//! explicit memo that builds each descriptor once.

mod cache;
mod descriptor;
mod mapping;

pub use cache::DescriptorCache;
pub use descriptor::{ColumnDescriptor, EntityDescriptor, IndexDescriptor, UniqueDescriptor};
pub use mapping::{Entity, EntityKind, EntityMapping, FieldMapping, GroupRef};
