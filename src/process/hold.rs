/*!
 * Hold Timers
 *
 * A single deadline heap per actor, keyed by instance id, instead of one
 * timer per held instance. Timers can be paused as a group (while the actor
 * is blocked) and resume with their remaining time intact.
 */

use crate::core::id::InstanceId;
use crate::resource::ResourceInstance;
use ahash::AHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct HoldTimers {
    heap: BinaryHeap<Reverse<(Instant, InstanceId)>>,
    held: AHashMap<InstanceId, (Instant, ResourceInstance)>,
    paused_at: Option<Instant>,
}

impl HoldTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start holding `instance` until `now + hold`
    ///
    /// Arming while paused keeps the full `hold` for after the resume.
    pub fn arm(&mut self, instance: ResourceInstance, hold: Duration, now: Instant) {
        let start = self.paused_at.unwrap_or(now);
        let deadline = start + hold;
        self.heap.push(Reverse((deadline, instance.id())));
        self.held.insert(instance.id(), (deadline, instance));
    }

    /// Earliest pending deadline; `None` while paused or empty
    pub fn next_deadline(&mut self) -> Option<Instant> {
        if self.paused_at.is_some() {
            return None;
        }
        self.discard_stale();
        self.heap.peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// Remove and return every instance whose deadline is at or before `now`
    pub fn pop_expired(&mut self, now: Instant) -> Vec<ResourceInstance> {
        if self.paused_at.is_some() {
            return Vec::new();
        }

        let mut expired = Vec::new();
        while let Some(Reverse((deadline, id))) = self.heap.peek().copied() {
            if deadline > now {
                break;
            }
            self.heap.pop();
            match self.held.get(&id) {
                Some((current, _)) if *current == deadline => {
                    if let Some((_, instance)) = self.held.remove(&id) {
                        expired.push(instance);
                    }
                }
                // stale entry from before a pause/resume or a removal
                _ => {}
            }
        }
        expired
    }

    /// Freeze all deadlines
    pub fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Shift all deadlines by the time spent paused
    pub fn resume(&mut self, now: Instant) {
        let Some(paused_at) = self.paused_at.take() else {
            return;
        };
        let delta = now.saturating_duration_since(paused_at);
        if delta.is_zero() {
            return;
        }

        self.heap.clear();
        for (id, (deadline, _)) in self.held.iter_mut() {
            *deadline += delta;
            self.heap.push(Reverse((*deadline, *id)));
        }
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn remove(&mut self, id: InstanceId) -> Option<ResourceInstance> {
        self.held.remove(&id).map(|(_, instance)| instance)
    }

    /// Abort every timer and hand back what was held
    pub fn drain(&mut self) -> Vec<ResourceInstance> {
        self.heap.clear();
        self.paused_at = None;
        self.held.drain().map(|(_, (_, instance))| instance).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse((deadline, id))) = self.heap.peek().copied() {
            match self.held.get(&id) {
                Some((current, _)) if *current == deadline => break,
                _ => {
                    self.heap.pop();
                }
            }
        }
    }
}
