/*!
 * Event Log
 *
 * Append-only, timestamped log stream consumed by status views. Records are
 * kept in a bounded history and fanned out to live subscribers; every record
 * is mirrored to `tracing` at its severity.
 */

use super::events::{Category, LogEvent, Severity};
use crate::core::limits::{LOG_HISTORY_CAPACITY, LOG_SUBSCRIBER_BUFFER};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// One entry of the log stream
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    /// Position in the stream, starting at 0
    pub seq: u64,
    /// Time since the log was created
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    #[serde(with = "time::serde::timestamp")]
    pub wall_clock: OffsetDateTime,
    pub severity: Severity,
    pub category: Category,
    pub event: LogEvent,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}s] {}", self.elapsed.as_secs_f64(), self.event)
    }
}

struct LogInner {
    started: Instant,
    next_seq: AtomicU64,
    history: Mutex<VecDeque<LogRecord>>,
    capacity: usize,
    tx: broadcast::Sender<LogRecord>,
}

/// Shared handle to the log stream; clones append to the same log
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<LogInner>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(LOG_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(LOG_SUBSCRIBER_BUFFER);
        Self {
            inner: Arc::new(LogInner {
                started: Instant::now(),
                next_seq: AtomicU64::new(0),
                history: Mutex::new(VecDeque::with_capacity(capacity.min(LOG_HISTORY_CAPACITY))),
                capacity: capacity.max(1),
                tx,
            }),
        }
    }

    /// Append an event and return the stored record
    pub fn append(&self, event: LogEvent) -> LogRecord {
        let record = {
            // seq is assigned under the history lock so history order == seq order
            let mut history = self.inner.history.lock();
            let record = LogRecord {
                seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed),
                elapsed: self.inner.started.elapsed(),
                wall_clock: OffsetDateTime::now_utc(),
                severity: event.severity(),
                category: event.category(),
                event,
            };
            if history.len() == self.inner.capacity {
                history.pop_front();
            }
            history.push_back(record.clone());
            record
        };

        mirror_to_tracing(&record);

        // No subscribers is fine
        let _ = self.inner.tx.send(record.clone());
        record
    }

    /// Live feed of records appended after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LogRecord> {
        self.inner.tx.subscribe()
    }

    /// Retained records, oldest first
    pub fn history(&self) -> Vec<LogRecord> {
        self.inner.history.lock().iter().cloned().collect()
    }

    /// Rendered lines of the retained records
    pub fn lines(&self) -> Vec<String> {
        self.inner
            .history
            .lock()
            .iter()
            .map(|r| r.to_string())
            .collect()
    }

    /// Retained records matching a predicate
    pub fn find<F>(&self, mut predicate: F) -> Vec<LogRecord>
    where
        F: FnMut(&LogEvent) -> bool,
    {
        self.inner
            .history
            .lock()
            .iter()
            .filter(|r| predicate(&r.event))
            .cloned()
            .collect()
    }

    /// Total records ever appended, including evicted ones
    pub fn total_appended(&self) -> u64 {
        self.inner.next_seq.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.started.elapsed()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("retained", &self.inner.history.lock().len())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

fn mirror_to_tracing(record: &LogRecord) {
    let category = record.category;
    match record.severity {
        Severity::Debug => tracing::debug!(seq = record.seq, ?category, "{}", record.event),
        Severity::Info => tracing::info!(seq = record.seq, ?category, "{}", record.event),
        Severity::Warn => tracing::warn!(seq = record.seq, ?category, "{}", record.event),
        Severity::Error => tracing::error!(seq = record.seq, ?category, "{}", record.event),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::id::ProcessId;

    fn removed(id: u32) -> LogEvent {
        LogEvent::ProcessRemoved {
            id: ProcessId(id),
            released: 0,
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let log = EventLog::with_capacity(3);
        for i in 0..5 {
            log.append(removed(i));
        }
        let seqs: Vec<u64> = log.history().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
        assert_eq!(log.total_appended(), 5);
    }

    #[test]
    fn test_record_renders_with_elapsed_prefix() {
        let log = EventLog::new();
        let record = log.append(LogEvent::SimulationStopped);
        let line = record.to_string();
        assert!(line.starts_with('['));
        assert!(line.ends_with("s] Simulation stopped"));
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let log = EventLog::new();
        let mut rx = log.subscribe();
        log.append(removed(1));
        log.append(removed(2));

        assert_eq!(rx.recv().await.unwrap().event, removed(1));
        assert_eq!(rx.recv().await.unwrap().event, removed(2));
    }

    #[test]
    fn test_record_serializes() {
        let log = EventLog::new();
        let record = log.append(LogEvent::SafeState { sequence: vec![] });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["seq"], 0);
        assert_eq!(json["category"], "detection");
        assert_eq!(json["event"]["event"], "safe_state");
    }
}
