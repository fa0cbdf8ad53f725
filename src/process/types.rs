/*!
 * Process Types
 * Common types for process actors
 */

use crate::core::errors::{ValidationError, ValidationResult};
use crate::core::id::{ProcessId, ResourceId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Process lifecycle result
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Process lifecycle errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition {
        from: ProcessState,
        to: ProcessState,
    },
}

/// Process lifecycle state
///
/// `Requesting`, `Granted` and `Released` are transient: they are passed
/// through while an actor talks to the coordinator and are never the settled
/// state reported by status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Holds nothing and waits for nothing
    Idle,
    /// Asking the coordinator for a resource
    Requesting,
    /// Request succeeded, hold timer not yet armed
    Granted,
    /// Holds at least one instance
    Holding,
    /// Handing an instance back
    Released,
    /// Denied; suspended until the awaited type is released
    Blocked,
    /// Cancelled; terminal
    Stopped,
}

impl ProcessState {
    /// Whether the lifecycle allows moving from `self` to `to`
    pub fn can_transition_to(self, to: ProcessState) -> bool {
        use ProcessState::*;

        if to == Stopped {
            return self != Stopped;
        }

        matches!(
            (self, to),
            (Idle, Requesting)
                | (Holding, Requesting)
                | (Blocked, Requesting)
                | (Requesting, Granted)
                | (Requesting, Blocked)
                // rejected request: back to where it came from
                | (Requesting, Idle)
                | (Requesting, Holding)
                | (Granted, Holding)
                | (Holding, Released)
                | (Released, Idle)
                | (Released, Holding)
        )
    }

}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Idle => "idle",
            ProcessState::Requesting => "requesting",
            ProcessState::Granted => "granted",
            ProcessState::Holding => "running",
            ProcessState::Released => "released",
            ProcessState::Blocked => "blocked",
            ProcessState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// How an actor picks the resource type it names on each request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "resources", rename_all = "snake_case")]
pub enum RequestPolicy {
    /// Uniformly among all registered types
    #[default]
    Random,
    /// Round-robin over a fixed list
    Cycle(Vec<ResourceId>),
}

/// Static configuration of one process actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub id: ProcessId,
    /// Time between request attempts
    pub request_period: Duration,
    /// Time each granted instance is held before release
    pub hold_duration: Duration,
    #[serde(default)]
    pub policy: RequestPolicy,
    /// Seed for `RequestPolicy::Random`; entropy when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl ProcessConfig {
    pub fn new(id: ProcessId, request_period: Duration, hold_duration: Duration) -> Self {
        Self {
            id,
            request_period,
            hold_duration,
            policy: RequestPolicy::Random,
            seed: None,
        }
    }

    /// Build from seconds as entered on the command surface
    pub fn from_secs(id: u32, request_period_secs: f64, hold_secs: f64) -> ValidationResult<Self> {
        let id = ProcessId(id);
        let request_period = secs_to_duration(request_period_secs)?;
        let hold = secs_to_duration(hold_secs)?;
        Ok(Self::new(id, request_period, hold))
    }

    pub fn with_policy(mut self, policy: RequestPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check timing bounds against the configured minimum period
    pub fn validate(&self, min_request_period: Duration) -> ValidationResult<()> {
        if self.request_period < min_request_period {
            return Err(ValidationError::RequestPeriodTooShort {
                id: self.id,
                period_ms: self.request_period.as_millis() as u64,
                min_ms: min_request_period.as_millis() as u64,
            });
        }
        if self.hold_duration.is_zero() {
            return Err(ValidationError::NonPositiveHold { id: self.id });
        }
        Ok(())
    }
}

fn secs_to_duration(secs: f64) -> ValidationResult<Duration> {
    if !secs.is_finite() {
        return Err(ValidationError::InvalidNumber(secs.to_string()));
    }
    if secs <= 0.0 {
        return Ok(Duration::ZERO);
    }
    Duration::try_from_secs_f64(secs).map_err(|e| ValidationError::InvalidNumber(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::limits::MIN_REQUEST_PERIOD;

    #[test]
    fn test_lifecycle_transitions() {
        use ProcessState::*;
        assert!(Idle.can_transition_to(Requesting));
        assert!(Requesting.can_transition_to(Blocked));
        assert!(Blocked.can_transition_to(Requesting));
        assert!(Holding.can_transition_to(Requesting));
        assert!(Released.can_transition_to(Idle));

        assert!(!Idle.can_transition_to(Holding));
        assert!(!Blocked.can_transition_to(Granted));
        assert!(!Blocked.can_transition_to(Released));
    }

    #[test]
    fn test_stopped_reachable_from_any_state_and_terminal() {
        use ProcessState::*;
        for state in [Idle, Requesting, Granted, Holding, Released, Blocked] {
            assert!(state.can_transition_to(Stopped), "{:?}", state);
            assert!(!Stopped.can_transition_to(state));
        }
        assert!(!Stopped.can_transition_to(Stopped));
    }

    #[test]
    fn test_validate_timing() {
        let ok = ProcessConfig::from_secs(1, 0.5, 1.0).unwrap();
        assert!(ok.validate(MIN_REQUEST_PERIOD).is_ok());

        let fast = ProcessConfig::from_secs(1, 0.4, 1.0).unwrap();
        assert!(matches!(
            fast.validate(MIN_REQUEST_PERIOD),
            Err(ValidationError::RequestPeriodTooShort { period_ms: 400, .. })
        ));

        let no_hold = ProcessConfig::from_secs(1, 1.0, 0.0).unwrap();
        assert_eq!(
            no_hold.validate(MIN_REQUEST_PERIOD),
            Err(ValidationError::NonPositiveHold { id: ProcessId(1) })
        );

        assert!(ProcessConfig::from_secs(1, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_policy_deserializes() {
        let policy: RequestPolicy =
            serde_json::from_str(r#"{"kind":"cycle","resources":[0,1]}"#).unwrap();
        assert_eq!(policy, RequestPolicy::Cycle(vec![ResourceId(0), ResourceId(1)]));
        let random: RequestPolicy = serde_json::from_str(r#"{"kind":"random"}"#).unwrap();
        assert_eq!(random, RequestPolicy::Random);
    }
}
