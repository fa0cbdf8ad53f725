/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::id::{InstanceId, ProcessId, ResourceId};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Command validation errors, raised before any state is touched
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Resource id {0} already registered")]
    #[diagnostic(
        code(validation::duplicate_resource),
        help("Resource ids must be unique. Pick an unused id.")
    )]
    DuplicateResource(ResourceId),

    #[error("Process id {0} already registered")]
    #[diagnostic(
        code(validation::duplicate_process),
        help("Process ids must be unique among live processes.")
    )]
    DuplicateProcess(ProcessId),

    #[error("Resource limit reached: at most {limit} resource types")]
    #[diagnostic(
        code(validation::resource_capacity),
        help("Registry is full. Resource types cannot be removed once added.")
    )]
    ResourceCapacity { limit: usize },

    #[error("Process limit reached: at most {limit} processes")]
    #[diagnostic(
        code(validation::process_capacity),
        help("Remove a process before adding another.")
    )]
    ProcessCapacity { limit: usize },

    #[error("Resource {id} total must be positive")]
    #[diagnostic(code(validation::non_positive_total))]
    NonPositiveTotal { id: ResourceId },

    #[error("Resource {id} name must not be empty")]
    #[diagnostic(code(validation::empty_name))]
    EmptyName { id: ResourceId },

    #[error("Process {id} request period {period_ms}ms is below the {min_ms}ms minimum")]
    #[diagnostic(
        code(validation::request_period_too_short),
        help("Use a request period of at least 0.5 seconds.")
    )]
    RequestPeriodTooShort {
        id: ProcessId,
        period_ms: u64,
        min_ms: u64,
    },

    #[error("Process {id} hold duration must be positive")]
    #[diagnostic(code(validation::non_positive_hold))]
    NonPositiveHold { id: ProcessId },

    #[error("Process {0} not found")]
    #[diagnostic(
        code(validation::unknown_process),
        help("The process may already have been removed.")
    )]
    UnknownProcess(ProcessId),

    #[error("Invalid number: {0}")]
    #[diagnostic(code(validation::invalid_number))]
    InvalidNumber(String),
}

/// Allocation decision errors
///
/// A denied request is not an error; it is reported as a blocked outcome.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum AllocationError {
    #[error("Process {process} requested resource {requested} while waiting for {waiting_for}")]
    #[diagnostic(
        code(allocation::concurrency_violation),
        help("A process may have at most one outstanding request.")
    )]
    ConcurrencyViolation {
        process: ProcessId,
        waiting_for: ResourceId,
        requested: ResourceId,
    },

    #[error("Process {process} already holds all {held} instances of resource {resource}")]
    #[diagnostic(
        code(allocation::holds_all_instances),
        help("Requesting beyond a resource's total would block the process on itself.")
    )]
    HoldsAllInstances {
        process: ProcessId,
        resource: ResourceId,
        held: u32,
    },

    #[error("Process {0} is not registered")]
    #[diagnostic(code(allocation::unknown_process))]
    UnknownProcess(ProcessId),

    #[error("Resource {0} is not registered")]
    #[diagnostic(code(allocation::unknown_resource))]
    UnknownResource(ResourceId),

    #[error("Teardown inconsistency: {0}")]
    #[diagnostic(
        code(allocation::teardown_inconsistency),
        help("Usually a release racing a forced removal. State was left unchanged.")
    )]
    TeardownInconsistency(String),
}

impl AllocationError {
    pub(crate) fn instance_not_held(process: ProcessId, instance: InstanceId) -> Self {
        AllocationError::TeardownInconsistency(format!(
            "instance {} is not held by process {}",
            instance, process
        ))
    }
}

/// Unified simulation error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum SimError {
    #[error("Validation error: {0}")]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error("Allocation error: {0}")]
    #[diagnostic(transparent)]
    Allocation(#[from] AllocationError),

    #[error("Scenario error: {0}")]
    #[diagnostic(
        code(sim::scenario),
        help("Scenario files are JSON with `resources` and `processes` arrays.")
    )]
    Scenario(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    #[diagnostic(code(sim::io))]
    Io(#[from] std::io::Error),
}

/// Result type for validated commands
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for allocation decisions
pub type AllocationResult<T> = Result<T, AllocationError>;

/// Result type for the simulation facade
pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_serialize_with_tag() {
        let err = AllocationError::ConcurrencyViolation {
            process: ProcessId(1),
            waiting_for: ResourceId(2),
            requested: ResourceId(3),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error_type"], "concurrency_violation");
        assert_eq!(json["details"]["waiting_for"], 2);
    }

    #[test]
    fn test_sim_error_wraps_validation() {
        let err: SimError = ValidationError::ProcessCapacity { limit: 10 }.into();
        assert!(err.to_string().contains("at most 10 processes"));
    }
}
