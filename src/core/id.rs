/*!
 * ID Types
 * Type-safe identifiers and the instance id generator
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// Type-Safe ID Wrappers
// ============================================================================

/// Resource type ID (user supplied, unique among registered types)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u32);

/// Process ID (user supplied, unique among live processes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

/// Allocation record ID (system assigned, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Instance ID Generator
// ============================================================================

/// Monotonic counter for allocation records
///
/// Ids are handed out in increasing order and never recycled, so an instance
/// id identifies exactly one grant for the lifetime of the system. Clones
/// share the same counter.
#[repr(C, align(64))]
#[derive(Debug, Clone)]
pub struct InstanceIdGenerator {
    counter: Arc<AtomicU64>,
}

impl InstanceIdGenerator {
    /// Create new generator starting at given value
    #[inline]
    pub fn new(start: u64) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Generate next ID
    #[inline]
    pub fn next(&self) -> InstanceId {
        InstanceId(self.counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Value the next call to `next` will return
    #[inline]
    pub fn peek(&self) -> InstanceId {
        InstanceId(self.counter.load(Ordering::Relaxed))
    }
}

impl Default for InstanceIdGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_monotonic() {
        let gen = InstanceIdGenerator::default();
        let a = gen.next();
        let b = gen.next();
        assert!(b > a);
        assert_eq!(gen.peek(), InstanceId(3));
    }

    #[test]
    fn test_clones_share_counter() {
        let gen = InstanceIdGenerator::new(10);
        let other = gen.clone();
        assert_eq!(gen.next(), InstanceId(10));
        assert_eq!(other.next(), InstanceId(11));
    }

    #[test]
    fn test_concurrent_generation_is_unique() {
        let gen = InstanceIdGenerator::default();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gen = gen.clone();
                std::thread::spawn(move || (0..250).map(|_| gen.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "instance id {} reused", id);
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
