/*!
 * Resource Module
 * Resource pools, allocation records and the resource registry
 */

pub mod instance;
pub mod registry;
pub mod types;

// Re-export for convenience
pub use instance::ResourceInstance;
pub use registry::ResourceRegistry;
pub use types::{ResourceSummary, ResourceType};
