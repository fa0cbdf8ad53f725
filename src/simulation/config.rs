/*!
 * Simulation Configuration
 * Defaults from core limits, overridable from the environment
 */

use crate::coordinator::CoordinatorSettings;
use crate::core::limits::{
    BLOCKED_RETRY_TIMEOUT, DEFAULT_DETECTION_INTERVAL, LOG_HISTORY_CAPACITY, MAX_PROCESSES,
    MAX_RESOURCE_TYPES, MIN_REQUEST_PERIOD,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

pub const ENV_DETECT_INTERVAL: &str = "DEADLOCK_DETECT_INTERVAL";
pub const ENV_MAX_RESOURCES: &str = "DEADLOCK_MAX_RESOURCES";
pub const ENV_MAX_PROCESSES: &str = "DEADLOCK_MAX_PROCESSES";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Period between deadlock scans
    pub detection_interval: Duration,
    pub max_resources: usize,
    pub max_processes: usize,
    /// Records kept in the log history
    pub log_history: usize,
    /// Fallback retry for blocked actors
    pub blocked_retry: Duration,
    pub min_request_period: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            detection_interval: DEFAULT_DETECTION_INTERVAL,
            max_resources: MAX_RESOURCE_TYPES,
            max_processes: MAX_PROCESSES,
            log_history: LOG_HISTORY_CAPACITY,
            blocked_retry: BLOCKED_RETRY_TIMEOUT,
            min_request_period: MIN_REQUEST_PERIOD,
        }
    }
}

impl SimulationConfig {
    /// Defaults overridden by `DEADLOCK_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_DETECT_INTERVAL) {
            config.detection_interval = parse_interval(&raw);
        }
        if let Some(max) = lookup(ENV_MAX_RESOURCES).and_then(|raw| parse_limit(ENV_MAX_RESOURCES, &raw)) {
            config.max_resources = max;
        }
        if let Some(max) = lookup(ENV_MAX_PROCESSES).and_then(|raw| parse_limit(ENV_MAX_PROCESSES, &raw)) {
            config.max_processes = max;
        }

        config
    }

    pub fn with_detection_interval(mut self, interval: Duration) -> Self {
        self.detection_interval = interval;
        self
    }

    pub fn with_log_history(mut self, records: usize) -> Self {
        self.log_history = records;
        self
    }

    pub fn with_blocked_retry(mut self, retry: Duration) -> Self {
        self.blocked_retry = retry;
        self
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            max_resources: self.max_resources,
            max_processes: self.max_processes,
            min_request_period: self.min_request_period,
            blocked_retry: self.blocked_retry,
        }
    }
}

/// Parse a detection interval in whole seconds
///
/// Anything that is not a positive integer falls back to the default.
pub fn parse_interval(raw: &str) -> Duration {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            warn!(value = raw, "Invalid detection interval, using default");
            DEFAULT_DETECTION_INTERVAL
        }
    }
}

fn parse_limit(key: &str, raw: &str) -> Option<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!(key, value = raw, "Invalid limit, using default");
            None
        }
    }
}
