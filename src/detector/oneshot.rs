/*!
 * Deadlock Detector
 * One-shot detection over a coordinator snapshot, with report retention
 */

use super::safety::{scan, SafetyScan};
use crate::coordinator::{AllocationSnapshot, Coordinator};
use crate::core::id::ProcessId;
use crate::core::limits::MIN_DEADLOCK_SET;
use crate::monitoring::{detection_span, EventLog, LogEvent};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Source of point-in-time allocation state
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> AllocationSnapshot;
}

impl SnapshotSource for Coordinator {
    fn snapshot(&self) -> AllocationSnapshot {
        Coordinator::snapshot(self)
    }
}

/// What one detection cycle concluded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// No processes or no resources; nothing to check
    Idle,
    /// Every process can finish, in this order
    Safe { sequence: Vec<ProcessId> },
    /// These processes cannot all finish
    Deadlock { members: Vec<ProcessId> },
    /// A single process cannot finish; not reported as deadlock
    Stalled { member: ProcessId },
}

impl Verdict {
    #[inline]
    pub fn is_deadlock(&self) -> bool {
        matches!(self, Verdict::Deadlock { .. })
    }

    pub fn deadlocked(&self) -> &[ProcessId] {
        match self {
            Verdict::Deadlock { members } => members,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub cycle: u64,
    pub verdict: Verdict,
    pub snapshot: AllocationSnapshot,
}

/// Detection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectorStats {
    pub cycles: u64,
    pub deadlocks_reported: u64,
}

pub struct DeadlockDetector {
    source: Arc<dyn SnapshotSource>,
    log: EventLog,
    cycles: AtomicU64,
    deadlocks_reported: AtomicU64,
    last: RwLock<Option<DetectionReport>>,
}

impl DeadlockDetector {
    pub fn new(source: Arc<dyn SnapshotSource>, log: EventLog) -> Self {
        Self {
            source,
            log,
            cycles: AtomicU64::new(0),
            deadlocks_reported: AtomicU64::new(0),
            last: RwLock::new(None),
        }
    }

    /// Detector reading from, and logging to, a coordinator
    pub fn for_coordinator(coordinator: &Coordinator) -> Self {
        Self::new(Arc::new(coordinator.clone()), coordinator.log().clone())
    }

    /// Run one detection cycle
    ///
    /// Reads a single snapshot and never mutates allocation state.
    pub fn run_once(&self) -> DetectionReport {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let _span = detection_span(cycle).entered();

        let snapshot = self.source.snapshot();
        let verdict = if snapshot.is_empty() {
            Verdict::Idle
        } else {
            classify(&snapshot, &scan(&snapshot))
        };

        match &verdict {
            Verdict::Idle => debug!("Nothing to check"),
            Verdict::Safe { sequence } => {
                self.log.append(LogEvent::SafeState {
                    sequence: sequence.clone(),
                });
            }
            Verdict::Deadlock { members } => {
                self.deadlocks_reported.fetch_add(1, Ordering::Relaxed);
                self.log.append(LogEvent::DeadlockDetected {
                    members: members.clone(),
                });
            }
            Verdict::Stalled { member } => {
                debug!(process = %member, "Single process cannot finish")
            }
        }

        let report = DetectionReport {
            cycle,
            verdict,
            snapshot,
        };
        *self.last.write() = Some(report.clone());
        report
    }

    /// Most recent report, if any cycle ran
    pub fn last_report(&self) -> Option<DetectionReport> {
        self.last.read().clone()
    }

    pub fn stats(&self) -> DetectorStats {
        DetectorStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            deadlocks_reported: self.deadlocks_reported.load(Ordering::Relaxed),
        }
    }
}

fn classify(snapshot: &AllocationSnapshot, result: &SafetyScan) -> Verdict {
    let ids = |rows: &[usize]| -> Vec<ProcessId> {
        rows.iter().map(|i| snapshot.processes[*i]).collect()
    };

    match result.unfinished.len() {
        0 => Verdict::Safe {
            sequence: ids(&result.finished),
        },
        n if n >= MIN_DEADLOCK_SET => Verdict::Deadlock {
            members: ids(&result.unfinished),
        },
        _ => Verdict::Stalled {
            member: snapshot.processes[result.unfinished[0]],
        },
    }
}
