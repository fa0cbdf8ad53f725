/*!
 * Process Actor
 *
 * One tokio task per process. On every request-period tick the actor names a
 * resource type and asks the coordinator for a unit; granted units are held
 * for the hold duration and handed back. A denied actor suspends on the
 * coordinator's wait channel for that type and retries on wake-up, possibly
 * losing the race again. While blocked its hold timers are paused.
 *
 * Every wait (period, hold, blocked) is raced against the stop signal, so a
 * stop takes effect at any point of the lifecycle.
 */

use super::hold::HoldTimers;
use super::picker::ResourcePicker;
use super::types::{ProcessConfig, ProcessError, ProcessResult, ProcessState};
use crate::coordinator::{Coordinator, RequestOutcome, WaitTicket, WakeReason};
use crate::core::errors::AllocationError;
use crate::core::id::{ProcessId, ResourceId};
use crate::monitoring::actor_span;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace, warn, Instrument};

/// Handle kept by the coordinator for a running actor
#[derive(Debug)]
pub struct ActorHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ActorHandle {
    /// Ask the actor to stop; it exits at its next suspension point
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

enum Step {
    Stop,
    Request,
    Expire,
    Retry(WakeReason),
}

pub struct ProcessActor {
    config: ProcessConfig,
    /// Which admission of `config.id` this actor serves
    registration: u64,
    coordinator: Coordinator,
    state: ProcessState,
    holds: HoldTimers,
    picker: ResourcePicker,
    ticket: Option<WaitTicket>,
    stop_rx: watch::Receiver<bool>,
    next_request: Instant,
    blocked_retry: Duration,
}

impl ProcessActor {
    /// Spawn the actor for one admission of a process
    ///
    /// Every coordinator call the actor makes is scoped to `registration`, so
    /// an actor still winding down after its process was removed can never
    /// act on a later process registered under the same id.
    pub fn spawn(coordinator: Coordinator, config: ProcessConfig, registration: u64) -> ActorHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let span = actor_span(config.id.0);
        let actor = Self::new(coordinator, config, registration, stop_rx);
        let join = tokio::spawn(actor.run().instrument(span));
        ActorHandle { stop_tx, join }
    }

    fn new(
        coordinator: Coordinator,
        config: ProcessConfig,
        registration: u64,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        let blocked_retry = coordinator.settings().blocked_retry;
        Self {
            registration,
            picker: ResourcePicker::new(config.policy.clone(), config.seed),
            next_request: Instant::now() + config.request_period,
            config,
            coordinator,
            state: ProcessState::Idle,
            holds: HoldTimers::new(),
            ticket: None,
            stop_rx,
            blocked_retry,
        }
    }

    #[inline]
    fn id(&self) -> ProcessId {
        self.config.id
    }

    async fn run(mut self) {
        debug!("Actor running");

        while !*self.stop_rx.borrow() {
            let hold_deadline = self.holds.next_deadline();
            let blocked = self.ticket.is_some();

            let step = tokio::select! {
                biased;

                _ = self.stop_rx.changed() => Step::Stop,

                reason = await_ticket(&mut self.ticket, self.blocked_retry), if blocked => {
                    Step::Retry(reason)
                }

                _ = sleep_until(hold_deadline.unwrap_or(self.next_request)), if hold_deadline.is_some() => {
                    Step::Expire
                }

                _ = sleep_until(self.next_request), if !blocked => Step::Request,
            };

            match step {
                Step::Stop => break,
                Step::Request => self.on_request_tick(),
                Step::Expire => self.on_hold_expired(),
                Step::Retry(reason) => self.on_wake(reason),
            }
        }

        self.shutdown();
    }

    fn on_request_tick(&mut self) {
        let now = Instant::now();
        self.next_request = now + self.config.request_period;

        let registered = self.coordinator.resource_ids();
        match self.picker.pick(&registered) {
            Some(target) => self.attempt(target),
            None => trace!("No resource to request"),
        }
    }

    fn on_wake(&mut self, reason: WakeReason) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        trace!(?reason, resource = %ticket.resource(), "Woken while blocked");
        // never assume the wake-up means a unit is ours
        self.attempt(ticket.resource());
        if self.ticket.is_none() {
            self.next_request = Instant::now() + self.config.request_period;
        }
    }

    fn on_hold_expired(&mut self) {
        let expired = self.holds.pop_expired(Instant::now());
        let count = expired.len();
        for (i, instance) in expired.into_iter().enumerate() {
            self.transition(ProcessState::Released);
            if let Err(e) = self.coordinator.release_as(self.id(), self.registration, &instance) {
                // already force-released by a removal
                debug!(error = %e, "Release skipped");
            }
            if i + 1 < count {
                self.transition(ProcessState::Holding);
            }
        }
        self.settle();
    }

    fn attempt(&mut self, target: ResourceId) {
        self.transition(ProcessState::Requesting);

        match self.coordinator.request_as(self.id(), self.registration, target) {
            Ok(RequestOutcome::Granted(instance)) => {
                let now = Instant::now();
                self.transition(ProcessState::Granted);
                self.holds.resume(now);
                self.holds.arm(instance, self.config.hold_duration, now);
                self.transition(ProcessState::Holding);
            }
            Ok(RequestOutcome::Blocked(ticket)) => {
                self.holds.pause(Instant::now());
                self.ticket = Some(ticket);
                self.transition(ProcessState::Blocked);
            }
            Err(AllocationError::UnknownProcess(_)) => {
                // removed behind our back; the stop signal is on its way
                debug!("Process no longer registered");
                self.settle();
            }
            Err(e) => {
                // rejected requests are already logged by the coordinator
                trace!(error = %e, "Request rejected");
                self.settle();
            }
        }
    }

    fn settle(&mut self) {
        let settled = if self.ticket.is_some() {
            ProcessState::Blocked
        } else if self.holds.is_empty() {
            ProcessState::Idle
        } else {
            ProcessState::Holding
        };
        if self.state != settled {
            self.transition(settled);
        }
    }

    fn transition(&mut self, to: ProcessState) {
        if let Err(e) = check_transition(self.state, to) {
            warn!(error = %e, "Lifecycle violation");
        }
        self.state = to;
    }

    fn shutdown(&mut self) {
        let aborted = self.holds.drain().len();
        self.ticket = None;
        self.transition(ProcessState::Stopped);
        // no-op when the coordinator initiated the stop
        if self.coordinator.retire(self.id(), self.registration).is_some() {
            debug!("Actor removed itself on stop");
        }
        debug!(aborted_holds = aborted, "Actor stopped");
    }
}

fn check_transition(from: ProcessState, to: ProcessState) -> ProcessResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ProcessError::InvalidStateTransition { from, to })
    }
}

async fn await_ticket(ticket: &mut Option<WaitTicket>, fallback: Duration) -> WakeReason {
    match ticket {
        Some(ticket) => ticket.notified_or_timeout(fallback).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_transition() {
        assert!(check_transition(ProcessState::Idle, ProcessState::Requesting).is_ok());
        assert_eq!(
            check_transition(ProcessState::Blocked, ProcessState::Holding),
            Err(ProcessError::InvalidStateTransition {
                from: ProcessState::Blocked,
                to: ProcessState::Holding
            })
        );
    }
}
