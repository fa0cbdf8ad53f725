/*!
 * System Limits and Constants
 *
 * Centralized location for registry capacities, timing bounds and other
 * policy constants. Grouped by domain.
 */

use std::time::Duration;

// =============================================================================
// REGISTRY LIMITS
// =============================================================================

/// Maximum number of registered resource types
pub const MAX_RESOURCE_TYPES: usize = 10;

/// Maximum number of live processes
pub const MAX_PROCESSES: usize = 10;

// =============================================================================
// PROCESS TIMING
// =============================================================================

/// Smallest accepted request period (500ms)
/// Shorter periods flood the coordinator and the log
pub const MIN_REQUEST_PERIOD: Duration = Duration::from_millis(500);

/// Fallback retry for a blocked process (2s)
/// Only guards against a lost wake-up; the notify path is primary
pub const BLOCKED_RETRY_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// DETECTION
// =============================================================================

/// Default deadlock scan period in seconds
pub const DEFAULT_DETECTION_INTERVAL_SECS: u64 = 5;

/// Default deadlock scan period
pub const DEFAULT_DETECTION_INTERVAL: Duration =
    Duration::from_secs(DEFAULT_DETECTION_INTERVAL_SECS);

/// Minimum unfinished processes before a deadlock is reported
pub const MIN_DEADLOCK_SET: usize = 2;

// =============================================================================
// LOG STREAM
// =============================================================================

/// Records retained in the in-memory log history
pub const LOG_HISTORY_CAPACITY: usize = 1000;

/// Buffered records per live log subscriber before it starts lagging
pub const LOG_SUBSCRIBER_BUFFER: usize = 256;
