/*!
 * Process Module
 * Process actors, their lifecycle and hold timers
 */

pub mod actor;
pub mod hold;
pub mod picker;
pub mod types;

// Re-export for convenience
pub use actor::{ActorHandle, ProcessActor};
pub use hold::HoldTimers;
pub use picker::ResourcePicker;
pub use types::{ProcessConfig, ProcessError, ProcessResult, ProcessState, RequestPolicy};
