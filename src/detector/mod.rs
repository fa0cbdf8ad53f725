/*!
 * Detector Module
 * Safety scan, one-shot detection and the periodic detector task
 */

pub mod oneshot;
pub mod safety;
pub mod task;

// Re-export for convenience
pub use oneshot::{DeadlockDetector, DetectionReport, DetectorStats, SnapshotSource, Verdict};
pub use safety::{scan, SafetyScan};
pub use task::{DetectorCommand, DetectorTask};

#[cfg(test)]
pub use oneshot::MockSnapshotSource;
