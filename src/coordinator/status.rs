/*!
 * Status Summaries
 * Per-process status lines and coordinator counters for status views
 */

use crate::core::id::ProcessId;
use crate::process::ProcessState;
use serde::Serialize;
use std::fmt;

/// Units of one resource type held by a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeldSummary {
    pub resource: String,
    pub count: u32,
}

/// Settled status of one process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    pub id: ProcessId,
    pub state: ProcessState,
    /// Grouped by resource, in resource registration order
    pub holding: Vec<HeldSummary>,
    pub waiting_for: Option<String>,
}

impl ProcessStatus {
    fn write_holding(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, held) in self.holding.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} ({})", held.resource, held.count)?;
        }
        Ok(())
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process {} [", self.id)?;
        match (&self.waiting_for, self.holding.is_empty()) {
            (Some(awaited), true) => write!(f, "blocked, awaiting {}", awaited)?,
            (Some(awaited), false) => {
                write!(f, "blocked, awaiting {}, using ", awaited)?;
                self.write_holding(f)?;
            }
            (None, false) => {
                f.write_str("running, using ")?;
                self.write_holding(f)?;
            }
            (None, true) if self.state == ProcessState::Stopped => f.write_str("stopped")?,
            (None, true) => f.write_str("idle")?,
        }
        f.write_str("]")
    }
}

/// Coordinator decision counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub grants: u64,
    pub denials: u64,
    pub releases: u64,
    pub rejections: u64,
    pub notify_rounds: u64,
    pub removals: u64,
    pub teardown_inconsistencies: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(resource: &str, count: u32) -> HeldSummary {
        HeldSummary {
            resource: resource.into(),
            count,
        }
    }

    #[test]
    fn test_status_lines() {
        let running = ProcessStatus {
            id: ProcessId(3),
            state: ProcessState::Holding,
            holding: vec![held("R0", 2), held("R1", 1)],
            waiting_for: None,
        };
        assert_eq!(running.to_string(), "Process 3 [running, using R0 (2), R1 (1)]");

        let blocked = ProcessStatus {
            id: ProcessId(3),
            state: ProcessState::Blocked,
            holding: vec![held("R0", 1)],
            waiting_for: Some("R1".into()),
        };
        assert_eq!(
            blocked.to_string(),
            "Process 3 [blocked, awaiting R1, using R0 (1)]"
        );

        let idle = ProcessStatus {
            id: ProcessId(3),
            state: ProcessState::Idle,
            holding: vec![],
            waiting_for: None,
        };
        assert_eq!(idle.to_string(), "Process 3 [idle]");
    }
}
