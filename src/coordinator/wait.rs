/*!
 * Wait Channels
 *
 * One broadcast channel per resource type. A release bumps the type's
 * generation; every receiver subscribed before the bump observes it, so a
 * waiter that subscribed under the coordinator lock cannot miss a wake-up.
 */

use crate::core::id::ResourceId;
use std::time::Duration;
use tokio::sync::watch;

/// Coordinator-owned sender side for one resource type
#[derive(Debug)]
pub(crate) struct WakeChannel {
    tx: watch::Sender<u64>,
    rounds: u64,
}

impl WakeChannel {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx, rounds: 0 }
    }

    /// Wake every current subscriber once
    pub(crate) fn broadcast(&mut self) {
        self.rounds += 1;
        // send_modify succeeds even with no receivers
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    pub(crate) fn subscribe(&self, resource: ResourceId) -> WaitTicket {
        WaitTicket {
            resource,
            rx: self.tx.subscribe(),
        }
    }

    /// Number of notify rounds broadcast so far
    pub(crate) fn rounds(&self) -> u64 {
        self.rounds
    }
}

/// Handed to a denied requester; resolves when the awaited type is released
#[derive(Debug)]
pub struct WaitTicket {
    resource: ResourceId,
    rx: watch::Receiver<u64>,
}

/// How a wait on a ticket ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// A unit of the awaited type was released
    Notified,
    /// The fallback timeout elapsed first
    TimedOut,
}

impl WaitTicket {
    #[inline]
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// Whether a release happened since the ticket was issued or last awaited
    pub fn is_notified(&self) -> bool {
        self.rx.has_changed().unwrap_or(true)
    }

    /// Wait for the next release of the awaited type
    pub async fn notified(&mut self) {
        // A closed channel means the coordinator is gone; return so the
        // caller can observe that on its next request.
        let _ = self.rx.changed().await;
    }

    /// Wait for a release, giving up after `fallback`
    pub async fn notified_or_timeout(&mut self, fallback: Duration) -> WakeReason {
        match tokio::time::timeout(fallback, self.notified()).await {
            Ok(()) => WakeReason::Notified,
            Err(_) => WakeReason::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_after_subscribe_is_seen() {
        let mut channel = WakeChannel::new();
        let mut a = channel.subscribe(ResourceId(0));
        let mut b = channel.subscribe(ResourceId(0));

        channel.broadcast();
        assert!(a.is_notified());
        a.notified().await;
        b.notified().await;
        assert_eq!(channel.rounds(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_before_subscribe_is_not_seen() {
        let mut channel = WakeChannel::new();
        channel.broadcast();
        let ticket = channel.subscribe(ResourceId(0));
        assert!(!ticket.is_notified());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_timeout() {
        let channel = WakeChannel::new();
        let mut ticket = channel.subscribe(ResourceId(0));
        let reason = ticket
            .notified_or_timeout(Duration::from_millis(50))
            .await;
        assert_eq!(reason, WakeReason::TimedOut);
    }
}
