/*!
 * Resource Registry
 * Ordered, capacity-bounded set of resource types
 */

use super::types::ResourceType;
use crate::core::errors::{ValidationError, ValidationResult};
use crate::core::id::ResourceId;
use std::sync::Arc;

/// Resource types in registration order
///
/// Registration order fixes the column order of every derived matrix.
#[derive(Debug)]
pub struct ResourceRegistry {
    types: Vec<Arc<ResourceType>>,
    capacity: usize,
}

impl ResourceRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            types: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Register a new pool; nothing changes on failure
    pub fn register(
        &mut self,
        id: ResourceId,
        name: &str,
        total: u32,
    ) -> ValidationResult<Arc<ResourceType>> {
        if total == 0 {
            return Err(ValidationError::NonPositiveTotal { id });
        }
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName { id });
        }
        if self.contains(id) {
            return Err(ValidationError::DuplicateResource(id));
        }
        if self.types.len() >= self.capacity {
            return Err(ValidationError::ResourceCapacity {
                limit: self.capacity,
            });
        }

        let resource = Arc::new(ResourceType::new(id, name.trim(), total));
        self.types.push(Arc::clone(&resource));
        Ok(resource)
    }

    pub fn get(&self, id: ResourceId) -> Option<&Arc<ResourceType>> {
        self.types.iter().find(|r| r.id() == id)
    }

    /// Column index of a resource in the derived matrices
    pub fn index_of(&self, id: ResourceId) -> Option<usize> {
        self.types.iter().position(|r| r.id() == id)
    }

    #[inline]
    pub fn contains(&self, id: ResourceId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceType>> {
        self.types.iter()
    }

    pub fn ids(&self) -> Vec<ResourceId> {
        self.types.iter().map(|r| r.id()).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
