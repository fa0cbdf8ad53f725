/*!
 * Coordinator Module
 * Serialized allocation decisions, wait channels and derived state views
 */

pub mod manager;
pub mod snapshot;
pub mod state;
pub mod status;
pub mod wait;

// Re-export for convenience
pub use manager::{Coordinator, CoordinatorBuilder, CoordinatorSettings};
pub use snapshot::AllocationSnapshot;
pub use state::{RemovalReport, RequestOutcome};
pub use status::{CoordinatorStats, HeldSummary, ProcessStatus};
pub use wait::{WaitTicket, WakeReason};
