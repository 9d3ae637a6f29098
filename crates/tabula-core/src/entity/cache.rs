//! Memoized descriptors.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;

use super::descriptor::EntityDescriptor;
use super::mapping::Entity;

/// Per-type descriptor cache.
///
/// Construct one per data-access root and pass it by reference. The mutex
/// is held while a missing descriptor is built, so concurrent first use of
/// a type builds it exactly once; cached descriptors are shared read-only.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    entries: Mutex<HashMap<TypeId, Arc<EntityDescriptor>>>,
}

impl DescriptorCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the descriptor for `E`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns the validation error of [`EntityDescriptor::build`]. Failed
    /// builds are not cached.
    pub fn get<E: Entity>(&self) -> Result<Arc<EntityDescriptor>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(descriptor) = entries.get(&TypeId::of::<E>()) {
            return Ok(Arc::clone(descriptor));
        }
        let descriptor = Arc::new(EntityDescriptor::build(&E::mapping())?);
        entries.insert(TypeId::of::<E>(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Number of cached descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` when nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
