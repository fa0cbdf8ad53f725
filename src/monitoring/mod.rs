/*!
 * Monitoring Module
 * User-facing event log and structured tracing
 */

pub mod events;
pub mod log;
pub mod tracer;

// Re-export for convenience
pub use events::{Category, LogEvent, Severity};
pub use log::{EventLog, LogRecord};
pub use tracer::{actor_span, detection_span, generate_run_id, init_tracing, run_span};
