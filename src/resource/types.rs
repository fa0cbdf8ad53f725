/*!
 * Resource Types
 * Multi-instance resource pools with lock-free acquire/release
 */

use crate::core::errors::{AllocationError, AllocationResult};
use crate::core::id::ResourceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// A named pool of interchangeable units
///
/// `available` only moves through `try_acquire` and `release`, both of which
/// keep it inside `0..=total`.
#[derive(Debug)]
pub struct ResourceType {
    id: ResourceId,
    name: String,
    total: u32,
    available: AtomicU32,
}

impl ResourceType {
    /// Create a fully available pool; `total` is validated by the registry
    pub(crate) fn new(id: ResourceId, name: impl Into<String>, total: u32) -> Self {
        Self {
            id,
            name: name.into(),
            total,
            available: AtomicU32::new(total),
        }
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[inline]
    pub fn available(&self) -> u32 {
        self.available.load(Ordering::Acquire)
    }

    /// Take one unit if any is free; a denial has no side effect
    pub fn try_acquire(&self) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |free| free.checked_sub(1))
            .is_ok()
    }

    /// Return one unit to the pool
    ///
    /// Releasing into a full pool is refused and leaves the count unchanged.
    pub fn release(&self) -> AllocationResult<()> {
        let total = self.total;
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |free| {
                (free < total).then_some(free + 1)
            })
            .map(|_| ())
            .map_err(|_| {
                AllocationError::TeardownInconsistency(format!(
                    "release of {} beyond its total of {}",
                    self.name, total
                ))
            })
    }

    pub fn summary(&self) -> ResourceSummary {
        ResourceSummary {
            id: self.id,
            name: self.name.clone(),
            available: self.available(),
            total: self.total,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (id {}): {}/{} available",
            self.name,
            self.id,
            self.available(),
            self.total
        )
    }
}

/// Point-in-time view of a resource type for status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub id: ResourceId,
    pub name: String,
    pub available: u32,
    pub total: u32,
}

impl fmt::Display for ResourceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (id {}): {}/{} available",
            self.name, self.id, self.available, self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_acquire_until_exhausted() {
        let res = ResourceType::new(ResourceId(0), "R0", 2);
        assert!(res.try_acquire());
        assert!(res.try_acquire());
        assert!(!res.try_acquire());
        assert_eq!(res.available(), 0);
    }

    #[test]
    fn test_release_never_exceeds_total() {
        let res = ResourceType::new(ResourceId(0), "R0", 1);
        assert!(res.release().is_err());
        assert_eq!(res.available(), 1);

        assert!(res.try_acquire());
        res.release().unwrap();
        assert_eq!(res.available(), 1);
    }

    #[test]
    fn test_concurrent_acquire_grants_exactly_total() {
        let res = Arc::new(ResourceType::new(ResourceId(0), "R0", 5));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let res = Arc::clone(&res);
                std::thread::spawn(move || (0..10).filter(|_| res.try_acquire()).count())
            })
            .collect();

        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 5);
        assert_eq!(res.available(), 0);
    }
}
