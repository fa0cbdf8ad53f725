/*!
 * Core Module
 * Fundamental identifiers, limits and error handling
 */

pub mod errors;
pub mod id;
pub mod limits;

// Re-export for convenience
pub use errors::*;
pub use id::{InstanceId, InstanceIdGenerator, ProcessId, ResourceId};
