/*!
 * Coordinator State
 *
 * Registries, allocation table and wait-for map. Every method here runs with
 * the coordinator lock held, so each one is a single atomic step with
 * respect to all other operations and to snapshots.
 */

use super::snapshot::AllocationSnapshot;
use super::status::{CoordinatorStats, HeldSummary, ProcessStatus};
use super::wait::{WaitTicket, WakeChannel};
use crate::core::errors::{AllocationError, AllocationResult, ValidationError, ValidationResult};
use crate::core::id::{InstanceId, InstanceIdGenerator, ProcessId, ResourceId};
use crate::monitoring::{EventLog, LogEvent};
use crate::process::actor::ActorHandle;
use crate::process::{ProcessConfig, ProcessState};
use crate::resource::{ResourceInstance, ResourceRegistry, ResourceType};
use ahash::AHashMap;
use std::sync::Arc;

/// Result of a request that passed validation
#[derive(Debug)]
pub enum RequestOutcome {
    /// A unit was granted
    Granted(ResourceInstance),
    /// No unit free; a wait edge now names the type
    Blocked(WaitTicket),
}

impl RequestOutcome {
    pub fn granted(self) -> Option<ResourceInstance> {
        match self {
            RequestOutcome::Granted(instance) => Some(instance),
            RequestOutcome::Blocked(_) => None,
        }
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        matches!(self, RequestOutcome::Blocked(_))
    }
}

/// What a forced removal released
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub released: Vec<InstanceId>,
    pub cleared_wait: Option<ResourceId>,
    /// Resource types whose waiters were notified, once each
    pub notified: Vec<ResourceId>,
}

pub(crate) struct ProcessEntry {
    pub(crate) config: ProcessConfig,
    /// Distinguishes this admission from earlier ones under the same id
    pub(crate) registration: u64,
    pub(crate) state: ProcessState,
    pub(crate) actor: Option<ActorHandle>,
}

impl ProcessEntry {
    fn transition(&mut self, to: ProcessState) {
        if !self.state.can_transition_to(to) {
            tracing::warn!(
                process = %self.config.id,
                from = ?self.state,
                to = ?to,
                "unexpected lifecycle transition"
            );
        }
        tracing::trace!(process = %self.config.id, from = ?self.state, to = ?to, "transition");
        self.state = to;
    }
}

pub(crate) struct CoordinatorState {
    resources: ResourceRegistry,
    /// Registration order
    processes: Vec<ProcessEntry>,
    max_processes: usize,
    allocations: AHashMap<ProcessId, Vec<ResourceInstance>>,
    wait_for: AHashMap<ProcessId, ResourceId>,
    wakers: AHashMap<ResourceId, WakeChannel>,
    next_registration: u64,
    stats: CoordinatorStats,
}

impl CoordinatorState {
    pub(crate) fn new(max_resources: usize, max_processes: usize) -> Self {
        Self {
            resources: ResourceRegistry::with_capacity(max_resources),
            processes: Vec::with_capacity(max_processes),
            max_processes,
            allocations: AHashMap::new(),
            wait_for: AHashMap::new(),
            wakers: AHashMap::new(),
            next_registration: 1,
            stats: CoordinatorStats::default(),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    pub(crate) fn register_resource(
        &mut self,
        id: ResourceId,
        name: &str,
        total: u32,
        log: &EventLog,
    ) -> ValidationResult<Arc<ResourceType>> {
        let resource = self.resources.register(id, name, total)?;
        self.wakers.insert(id, WakeChannel::new());
        log.append(LogEvent::ResourceAdded {
            id,
            name: resource.name().to_string(),
            total,
        });
        Ok(resource)
    }

    /// Admit a process and return its registration number
    pub(crate) fn admit_process(
        &mut self,
        config: ProcessConfig,
        log: &EventLog,
    ) -> ValidationResult<u64> {
        let id = config.id;
        if self.entry(id).is_some() {
            return Err(ValidationError::DuplicateProcess(id));
        }
        if self.processes.len() >= self.max_processes {
            return Err(ValidationError::ProcessCapacity {
                limit: self.max_processes,
            });
        }

        log.append(LogEvent::ProcessAdded {
            id,
            request_period_ms: config.request_period.as_millis() as u64,
            hold_ms: config.hold_duration.as_millis() as u64,
        });
        let registration = self.next_registration;
        self.next_registration += 1;
        self.allocations.insert(id, Vec::new());
        self.processes.push(ProcessEntry {
            config,
            registration,
            state: ProcessState::Idle,
            actor: None,
        });
        Ok(registration)
    }

    /// Attach a running actor; hands it back if the process is already gone
    pub(crate) fn attach_actor(
        &mut self,
        id: ProcessId,
        registration: u64,
        handle: ActorHandle,
    ) -> Result<(), ActorHandle> {
        match self.entry_for(id, Some(registration)) {
            Some(entry) => {
                entry.actor = Some(handle);
                Ok(())
            }
            None => Err(handle),
        }
    }

    // =========================================================================
    // Allocation decisions
    // =========================================================================

    pub(crate) fn request(
        &mut self,
        process: ProcessId,
        registration: Option<u64>,
        desired: ResourceId,
        ids: &InstanceIdGenerator,
        log: &EventLog,
    ) -> AllocationResult<RequestOutcome> {
        let resource = self
            .resources
            .get(desired)
            .cloned()
            .ok_or(AllocationError::UnknownResource(desired))?;
        // a stale registration never acts on a newer process with the same id
        let entry = self
            .entry_for(process, registration)
            .ok_or(AllocationError::UnknownProcess(process))?;
        let prior = entry.state;
        entry.transition(ProcessState::Requesting);

        log.append(LogEvent::RequestAttempt {
            process,
            resource: resource.name().to_string(),
        });

        if let Some(rejection) = self.check_request(process, &resource) {
            self.stats.rejections += 1;
            log.append(LogEvent::RequestRejected {
                process,
                reason: rejection.to_string(),
            });
            if let Some(entry) = self.entry_mut(process) {
                entry.transition(prior);
            }
            return Err(rejection);
        }

        if resource.try_acquire() {
            let instance = ResourceInstance::new(Arc::clone(&resource), ids.next());
            self.allocations
                .entry(process)
                .or_default()
                .push(instance.clone());
            self.stats.grants += 1;
            log.append(LogEvent::Granted {
                process,
                resource: resource.name().to_string(),
                instance: instance.id(),
            });
            if self.wait_for.remove(&process).is_some() {
                log.append(LogEvent::WaitCleared {
                    process,
                    resource: resource.name().to_string(),
                });
            }
            if let Some(entry) = self.entry_mut(process) {
                entry.transition(ProcessState::Granted);
                entry.transition(ProcessState::Holding);
            }
            return Ok(RequestOutcome::Granted(instance));
        }

        self.stats.denials += 1;
        self.wait_for.insert(process, desired);
        log.append(LogEvent::Blocked {
            process,
            resource: resource.name().to_string(),
        });
        if let Some(entry) = self.entry_mut(process) {
            entry.transition(ProcessState::Blocked);
        }

        let ticket = self
            .wakers
            .entry(desired)
            .or_insert_with(WakeChannel::new)
            .subscribe(desired);
        Ok(RequestOutcome::Blocked(ticket))
    }

    /// Rules checked before touching the pool; `None` means proceed
    fn check_request(
        &self,
        process: ProcessId,
        resource: &ResourceType,
    ) -> Option<AllocationError> {
        if let Some(&waiting_for) = self.wait_for.get(&process) {
            if waiting_for != resource.id() {
                return Some(AllocationError::ConcurrencyViolation {
                    process,
                    waiting_for,
                    requested: resource.id(),
                });
            }
        }

        let held = self.held_count(process, resource.id());
        if held >= resource.total() {
            return Some(AllocationError::HoldsAllInstances {
                process,
                resource: resource.id(),
                held,
            });
        }
        None
    }

    pub(crate) fn release(
        &mut self,
        process: ProcessId,
        registration: Option<u64>,
        instance: InstanceId,
        log: &EventLog,
    ) -> AllocationResult<()> {
        if registration.is_some() && self.entry_for(process, registration).is_none() {
            return Err(AllocationError::UnknownProcess(process));
        }
        let taken = self.allocations.get_mut(&process).and_then(|held| {
            held.iter()
                .position(|i| i.id() == instance)
                .map(|pos| held.remove(pos))
        });

        let Some(taken) = taken else {
            let err = AllocationError::instance_not_held(process, instance);
            self.record_inconsistency(&err, log);
            return Err(err);
        };

        if let Some(entry) = self.entry_mut(process) {
            if entry.state == ProcessState::Holding {
                entry.transition(ProcessState::Released);
            }
        }
        self.return_unit(process, &taken, log);
        self.notify(taken.resource_id(), log);
        self.settle(process);
        Ok(())
    }

    /// Force-release everything, clear the wait edge and unregister
    pub(crate) fn remove(
        &mut self,
        process: ProcessId,
        registration: Option<u64>,
        log: &EventLog,
    ) -> Option<(RemovalReport, Option<ActorHandle>)> {
        let pos = self.processes.iter().position(|e| {
            e.config.id == process && registration.map_or(true, |r| r == e.registration)
        })?;
        let mut entry = self.processes.remove(pos);
        entry.transition(ProcessState::Stopped);

        let mut report = RemovalReport::default();
        for instance in self.allocations.remove(&process).unwrap_or_default() {
            self.return_unit(process, &instance, log);
            report.released.push(instance.id());
            if !report.notified.contains(&instance.resource_id()) {
                report.notified.push(instance.resource_id());
            }
        }

        if let Some(awaited) = self.wait_for.remove(&process) {
            report.cleared_wait = Some(awaited);
            log.append(LogEvent::WaitCleared {
                process,
                resource: self.resource_name(awaited),
            });
        }

        // One round per affected type, however many units of it were freed
        for resource in &report.notified {
            self.notify(*resource, log);
        }

        self.stats.removals += 1;
        log.append(LogEvent::ProcessRemoved {
            id: process,
            released: report.released.len(),
        });
        Some((report, entry.actor.take()))
    }

    fn return_unit(&mut self, process: ProcessId, instance: &ResourceInstance, log: &EventLog) {
        match instance.resource().release() {
            Ok(()) => {
                self.stats.releases += 1;
                log.append(LogEvent::Released {
                    process,
                    resource: instance.resource_name().to_string(),
                    instance: instance.id(),
                });
            }
            Err(err) => self.record_inconsistency(&err, log),
        }
    }

    fn notify(&mut self, resource: ResourceId, log: &EventLog) {
        let waiters = self.wait_for.values().filter(|r| **r == resource).count();
        if let Some(channel) = self.wakers.get_mut(&resource) {
            channel.broadcast();
            self.stats.notify_rounds += 1;
        }
        if waiters > 0 {
            log.append(LogEvent::Notified {
                resource: self.resource_name(resource),
                waiters,
            });
        }
    }

    fn record_inconsistency(&mut self, err: &AllocationError, log: &EventLog) {
        self.stats.teardown_inconsistencies += 1;
        let detail = match err {
            AllocationError::TeardownInconsistency(detail) => detail.clone(),
            other => other.to_string(),
        };
        log.append(LogEvent::TeardownInconsistency { detail });
    }

    /// Recompute the settled state from the tables
    fn settle(&mut self, process: ProcessId) {
        let settled = if self.wait_for.contains_key(&process) {
            ProcessState::Blocked
        } else if self
            .allocations
            .get(&process)
            .is_some_and(|held| !held.is_empty())
        {
            ProcessState::Holding
        } else {
            ProcessState::Idle
        };
        if let Some(entry) = self.entry_mut(process) {
            if entry.state != settled {
                entry.transition(settled);
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub(crate) fn snapshot(&self) -> AllocationSnapshot {
        let m = self.resources.len();
        let mut snapshot = AllocationSnapshot {
            processes: self.processes.iter().map(|e| e.config.id).collect(),
            resources: self.resources.iter().map(|r| r.summary()).collect(),
            allocation: Vec::with_capacity(self.processes.len()),
            request: Vec::with_capacity(self.processes.len()),
            available: Vec::with_capacity(m),
        };
        snapshot.available = snapshot.resources.iter().map(|r| r.available).collect();

        for entry in &self.processes {
            let id = entry.config.id;
            let mut alloc_row = vec![0u32; m];
            for instance in self.allocations.get(&id).into_iter().flatten() {
                if let Some(j) = self.resources.index_of(instance.resource_id()) {
                    alloc_row[j] += 1;
                }
            }

            let mut request_row = vec![0u32; m];
            if let Some(j) = self
                .wait_for
                .get(&id)
                .and_then(|r| self.resources.index_of(*r))
            {
                request_row[j] = 1;
            }

            snapshot.allocation.push(alloc_row);
            snapshot.request.push(request_row);
        }
        snapshot
    }

    pub(crate) fn status(&self, entry: &ProcessEntry) -> ProcessStatus {
        let id = entry.config.id;
        let holding = self
            .resources
            .iter()
            .filter_map(|res| {
                let count = self.held_count(id, res.id());
                (count > 0).then(|| HeldSummary {
                    resource: res.name().to_string(),
                    count,
                })
            })
            .collect();

        ProcessStatus {
            id,
            state: entry.state,
            holding,
            waiting_for: self.wait_for.get(&id).map(|r| self.resource_name(*r)),
        }
    }

    pub(crate) fn statuses(&self) -> Vec<ProcessStatus> {
        self.processes.iter().map(|e| self.status(e)).collect()
    }

    pub(crate) fn held_count(&self, process: ProcessId, resource: ResourceId) -> u32 {
        self.allocations
            .get(&process)
            .map(|held| held.iter().filter(|i| i.resource_id() == resource).count() as u32)
            .unwrap_or(0)
    }

    pub(crate) fn held_by(&self, process: ProcessId) -> Vec<ResourceInstance> {
        self.allocations.get(&process).cloned().unwrap_or_default()
    }

    pub(crate) fn waiting_for(&self, process: ProcessId) -> Option<ResourceId> {
        self.wait_for.get(&process).copied()
    }

    pub(crate) fn entry(&self, id: ProcessId) -> Option<&ProcessEntry> {
        self.processes.iter().find(|e| e.config.id == id)
    }

    fn entry_mut(&mut self, id: ProcessId) -> Option<&mut ProcessEntry> {
        self.processes.iter_mut().find(|e| e.config.id == id)
    }

    /// Entry for `id`, restricted to one admission when `registration` is given
    fn entry_for(&mut self, id: ProcessId, registration: Option<u64>) -> Option<&mut ProcessEntry> {
        self.entry_mut(id)
            .filter(|e| registration.map_or(true, |r| r == e.registration))
    }

    pub(crate) fn process_ids(&self) -> Vec<ProcessId> {
        self.processes.iter().map(|e| e.config.id).collect()
    }

    pub(crate) fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub(crate) fn notify_rounds(&self, resource: ResourceId) -> u64 {
        self.wakers.get(&resource).map(|w| w.rounds()).unwrap_or(0)
    }

    pub(crate) fn stats(&self) -> CoordinatorStats {
        self.stats.clone()
    }

    fn resource_name(&self, id: ResourceId) -> String {
        self.resources
            .get(id)
            .map(|r| r.name().to_string())
            .unwrap_or_else(|| format!("resource {}", id))
    }

    /// Every broken system invariant, described; empty when consistent
    pub(crate) fn invariant_violations(&self) -> Vec<String> {
        let mut violations = self.snapshot().conservation_violations();

        for (process, _) in self.wait_for.iter() {
            if self.entry(*process).is_none() {
                violations.push(format!("dangling wait edge for removed process {}", process));
            }
        }
        for (process, held) in self.allocations.iter() {
            if self.entry(*process).is_none() && !held.is_empty() {
                violations.push(format!("removed process {} still holds instances", process));
            }
        }
        for res in self.resources.iter() {
            if res.available() > res.total() {
                violations.push(format!("{} available exceeds total", res.name()));
            }
        }
        violations
    }
}
