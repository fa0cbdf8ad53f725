/*!
 * Event System
 * Strongly-typed simulation events for the user-facing log stream
 */

use crate::core::id::{InstanceId, ProcessId, ResourceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event severity for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Severity {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

/// Event category for organization and querying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Category {
    System,
    Resource,
    Process,
    Allocation,
    Detection,
}

/// Event payload - one variant per kind of log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    SimulationStarted {
        interval_secs: u64,
    },
    SimulationStopped,
    ResourceAdded {
        id: ResourceId,
        name: String,
        total: u32,
    },
    ProcessAdded {
        id: ProcessId,
        request_period_ms: u64,
        hold_ms: u64,
    },
    ProcessRemoved {
        id: ProcessId,
        released: usize,
    },
    RequestAttempt {
        process: ProcessId,
        resource: String,
    },
    Granted {
        process: ProcessId,
        resource: String,
        instance: InstanceId,
    },
    Blocked {
        process: ProcessId,
        resource: String,
    },
    RequestRejected {
        process: ProcessId,
        reason: String,
    },
    Released {
        process: ProcessId,
        resource: String,
        instance: InstanceId,
    },
    Notified {
        resource: String,
        waiters: usize,
    },
    WaitCleared {
        process: ProcessId,
        resource: String,
    },
    TeardownInconsistency {
        detail: String,
    },
    DeadlockDetected {
        members: Vec<ProcessId>,
    },
    SafeState {
        sequence: Vec<ProcessId>,
    },
    CommandRejected {
        command: String,
        reason: String,
    },
}

impl LogEvent {
    pub fn severity(&self) -> Severity {
        match self {
            LogEvent::DeadlockDetected { .. } => Severity::Error,
            LogEvent::RequestRejected { .. }
            | LogEvent::TeardownInconsistency { .. }
            | LogEvent::CommandRejected { .. } => Severity::Warn,
            LogEvent::RequestAttempt { .. } | LogEvent::Notified { .. } => Severity::Debug,
            _ => Severity::Info,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            LogEvent::SimulationStarted { .. }
            | LogEvent::SimulationStopped
            | LogEvent::CommandRejected { .. } => Category::System,
            LogEvent::ResourceAdded { .. } => Category::Resource,
            LogEvent::ProcessAdded { .. } | LogEvent::ProcessRemoved { .. } => Category::Process,
            LogEvent::DeadlockDetected { .. } | LogEvent::SafeState { .. } => Category::Detection,
            _ => Category::Allocation,
        }
    }
}

fn join_ids(ids: &[ProcessId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEvent::SimulationStarted { interval_secs } => write!(
                f,
                "Simulation started (deadlock check every {}s)",
                interval_secs
            ),
            LogEvent::SimulationStopped => write!(f, "Simulation stopped"),
            LogEvent::ResourceAdded { id, name, total } => {
                write!(f, "Resource {} (id {}) added with {} instance(s)", name, id, total)
            }
            LogEvent::ProcessAdded {
                id,
                request_period_ms,
                hold_ms,
            } => write!(
                f,
                "Process {} added (requests every {:.1}s, holds for {:.1}s)",
                id,
                *request_period_ms as f64 / 1000.0,
                *hold_ms as f64 / 1000.0
            ),
            LogEvent::ProcessRemoved { id, released } => write!(
                f,
                "Process {} removed, {} instance(s) released",
                id, released
            ),
            LogEvent::RequestAttempt { process, resource } => {
                write!(f, "Process {} requesting {}", process, resource)
            }
            LogEvent::Granted {
                process,
                resource,
                instance,
            } => write!(f, "Process {} acquired {} {}", process, resource, instance),
            LogEvent::Blocked { process, resource } => {
                write!(f, "Process {} blocked awaiting {}", process, resource)
            }
            LogEvent::RequestRejected { process, reason } => {
                write!(f, "Request from process {} ignored: {}", process, reason)
            }
            LogEvent::Released {
                process,
                resource,
                instance,
            } => write!(f, "Process {} released {} {}", process, resource, instance),
            LogEvent::Notified { resource, waiters } => {
                write!(f, "Notifying {} process(es) awaiting {}", waiters, resource)
            }
            LogEvent::WaitCleared { process, resource } => {
                write!(f, "Process {} no longer waiting for {}", process, resource)
            }
            LogEvent::TeardownInconsistency { detail } => {
                write!(f, "Inconsistent release ignored: {}", detail)
            }
            LogEvent::DeadlockDetected { members } => {
                write!(f, "DEADLOCK DETECTED among processes [{}]", join_ids(members))
            }
            LogEvent::SafeState { sequence } if sequence.is_empty() => {
                write!(f, "System is in a safe state")
            }
            LogEvent::SafeState { sequence } => write!(
                f,
                "System is in a safe state (sequence: {})",
                join_ids(sequence)
            ),
            LogEvent::CommandRejected { command, reason } => {
                write!(f, "Command {} rejected: {}", command, reason)
            }
        }
    }
}
