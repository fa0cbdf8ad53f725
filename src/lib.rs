/*!
 * Deadlock Simulator Library
 *
 * Concurrent process actors competing for multi-instance resources, a
 * coordinator that serializes every allocation decision, and a periodic
 * safety-scan deadlock detector.
 */

pub mod coordinator;
pub mod core;
pub mod detector;
pub mod monitoring;
pub mod process;
pub mod resource;
pub mod simulation;

// Re-exports
pub use crate::core::errors::*;
pub use crate::core::id::{InstanceId, ProcessId, ResourceId};
pub use coordinator::{
    AllocationSnapshot, Coordinator, CoordinatorBuilder, ProcessStatus, RemovalReport,
    RequestOutcome,
};
pub use detector::{DeadlockDetector, DetectionReport, DetectorTask, Verdict};
pub use monitoring::{init_tracing, EventLog, LogEvent, LogRecord};
pub use process::{ProcessConfig, ProcessState, RequestPolicy};
pub use resource::{ResourceInstance, ResourceSummary, ResourceType};
pub use simulation::{Scenario, Simulation, SimulationConfig};
