/*!
 * Coordinator
 *
 * Owns the resource and process registries, the allocation table and the
 * wait-for map behind a single lock. Every allocation decision, release,
 * removal and snapshot is serialized through it; actors only ever hold a
 * cloned handle and never see the tables directly.
 */

use super::snapshot::AllocationSnapshot;
use super::state::{CoordinatorState, RemovalReport, RequestOutcome};
use super::status::{CoordinatorStats, ProcessStatus};
use crate::core::errors::{AllocationResult, ValidationResult};
use crate::core::id::{InstanceIdGenerator, ProcessId, ResourceId};
use crate::core::limits::{
    BLOCKED_RETRY_TIMEOUT, MAX_PROCESSES, MAX_RESOURCE_TYPES, MIN_REQUEST_PERIOD,
};
use crate::monitoring::EventLog;
use crate::process::{ProcessActor, ProcessConfig, ProcessState};
use crate::resource::{ResourceInstance, ResourceSummary, ResourceType};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Timing policy shared with the actors a coordinator spawns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub max_resources: usize,
    pub max_processes: usize,
    pub min_request_period: Duration,
    pub blocked_retry: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_resources: MAX_RESOURCE_TYPES,
            max_processes: MAX_PROCESSES,
            min_request_period: MIN_REQUEST_PERIOD,
            blocked_retry: BLOCKED_RETRY_TIMEOUT,
        }
    }
}

/// Cheaply cloneable handle; clones share the same state
#[derive(Clone)]
pub struct Coordinator {
    state: Arc<Mutex<CoordinatorState>>,
    ids: InstanceIdGenerator,
    log: EventLog,
    settings: CoordinatorSettings,
}

/// Builder for Coordinator
pub struct CoordinatorBuilder {
    settings: CoordinatorSettings,
    log: Option<EventLog>,
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            settings: CoordinatorSettings::default(),
            log: None,
        }
    }

    /// Share an existing log stream
    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Limits and timing policy in one go
    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_max_processes(mut self, max: usize) -> Self {
        self.settings.max_processes = max;
        self
    }

    pub fn build(self) -> Coordinator {
        let settings = self.settings;
        info!(
            max_resources = settings.max_resources,
            max_processes = settings.max_processes,
            "Coordinator initialized"
        );
        Coordinator {
            state: Arc::new(Mutex::new(CoordinatorState::new(
                settings.max_resources,
                settings.max_processes,
            ))),
            ids: InstanceIdGenerator::default(),
            log: self.log.unwrap_or_default(),
            settings,
        }
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Coordinator with default limits and a fresh log
    pub fn new() -> Self {
        CoordinatorBuilder::new().build()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a resource type with `total` units, all initially free
    pub fn register_resource(
        &self,
        id: ResourceId,
        name: &str,
        total: u32,
    ) -> ValidationResult<Arc<ResourceType>> {
        self.state.lock().register_resource(id, name, total, &self.log)
    }

    /// Register a process without starting an actor for it
    ///
    /// The process only moves when someone calls `request_resource` /
    /// `release_resource` on its behalf.
    pub fn admit_process(&self, config: ProcessConfig) -> ValidationResult<()> {
        self.admit(config).map(|_| ())
    }

    fn admit(&self, config: ProcessConfig) -> ValidationResult<u64> {
        config.validate(self.settings.min_request_period)?;
        self.state.lock().admit_process(config, &self.log)
    }

    /// Register a process and start its actor on the current tokio runtime
    pub fn register_process(&self, config: ProcessConfig) -> ValidationResult<()> {
        let id = config.id;
        let registration = self.admit(config.clone())?;

        let handle = ProcessActor::spawn(self.clone(), config, registration);
        if let Err(orphan) = self.state.lock().attach_actor(id, registration, handle) {
            // removed between admission and spawn
            orphan.stop();
        }
        debug!(process = %id, "Actor started");
        Ok(())
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Ask for one unit of `desired` on behalf of `process`
    ///
    /// `Ok(Blocked)` is the normal outcome when no unit is free; the returned
    /// ticket resolves on the next release of that type.
    pub fn request_resource(
        &self,
        process: ProcessId,
        desired: ResourceId,
    ) -> AllocationResult<RequestOutcome> {
        self.state
            .lock()
            .request(process, None, desired, &self.ids, &self.log)
    }

    /// Hand an instance back and notify every waiter for its type
    pub fn release_resource(
        &self,
        process: ProcessId,
        instance: &ResourceInstance,
    ) -> AllocationResult<()> {
        self.state
            .lock()
            .release(process, None, instance.id(), &self.log)
    }

    /// Force-release everything `process` holds, clear its wait edge,
    /// unregister it and stop its actor
    ///
    /// Idempotent: returns `None` if the process is not registered.
    pub fn remove_process(&self, process: ProcessId) -> Option<RemovalReport> {
        self.remove_registered(process, None)
    }

    fn remove_registered(
        &self,
        process: ProcessId,
        registration: Option<u64>,
    ) -> Option<RemovalReport> {
        let (report, actor) = self.state.lock().remove(process, registration, &self.log)?;
        if let Some(actor) = actor {
            actor.stop();
        }
        Some(report)
    }

    /// Remove every process; used on shutdown
    pub fn remove_all(&self) -> usize {
        let ids = self.state.lock().process_ids();
        ids.into_iter()
            .filter(|id| self.remove_process(*id).is_some())
            .count()
    }

    // =========================================================================
    // Actor-facing calls, scoped to one registration
    // =========================================================================

    /// `request_resource` on behalf of one specific admission of `process`
    ///
    /// Fails with `UnknownProcess` once that admission has been removed,
    /// even if the id was registered again since.
    pub(crate) fn request_as(
        &self,
        process: ProcessId,
        registration: u64,
        desired: ResourceId,
    ) -> AllocationResult<RequestOutcome> {
        self.state
            .lock()
            .request(process, Some(registration), desired, &self.ids, &self.log)
    }

    pub(crate) fn release_as(
        &self,
        process: ProcessId,
        registration: u64,
        instance: &ResourceInstance,
    ) -> AllocationResult<()> {
        self.state
            .lock()
            .release(process, Some(registration), instance.id(), &self.log)
    }

    /// Remove `process` only if it is still the given admission
    pub(crate) fn retire(&self, process: ProcessId, registration: u64) -> Option<RemovalReport> {
        self.remove_registered(process, Some(registration))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Allocation / Request / Available under one consistent view
    pub fn snapshot(&self) -> AllocationSnapshot {
        self.state.lock().snapshot()
    }

    pub fn resource_summaries(&self) -> Vec<ResourceSummary> {
        self.state
            .lock()
            .resources()
            .iter()
            .map(|r| r.summary())
            .collect()
    }

    pub fn resource_ids(&self) -> Vec<ResourceId> {
        self.state.lock().resources().ids()
    }

    pub fn process_ids(&self) -> Vec<ProcessId> {
        self.state.lock().process_ids()
    }

    pub fn process_statuses(&self) -> Vec<ProcessStatus> {
        self.state.lock().statuses()
    }

    pub fn process_status(&self, process: ProcessId) -> Option<ProcessStatus> {
        let state = self.state.lock();
        state.entry(process).map(|entry| state.status(entry))
    }

    pub fn process_state(&self, process: ProcessId) -> Option<ProcessState> {
        self.state.lock().entry(process).map(|e| e.state)
    }

    pub fn contains_process(&self, process: ProcessId) -> bool {
        self.state.lock().entry(process).is_some()
    }

    pub fn held_by(&self, process: ProcessId) -> Vec<ResourceInstance> {
        self.state.lock().held_by(process)
    }

    pub fn held_count(&self, process: ProcessId, resource: ResourceId) -> u32 {
        self.state.lock().held_count(process, resource)
    }

    pub fn waiting_for(&self, process: ProcessId) -> Option<ResourceId> {
        self.state.lock().waiting_for(process)
    }

    /// Notify rounds broadcast for one resource type so far
    pub fn notify_rounds(&self, resource: ResourceId) -> u64 {
        self.state.lock().notify_rounds(resource)
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.state.lock().stats()
    }

    /// Broken system invariants, described; empty when consistent
    pub fn invariant_violations(&self) -> Vec<String> {
        self.state.lock().invariant_violations()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn settings(&self) -> CoordinatorSettings {
        self.settings
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::AllocationError;

    fn config(id: u32) -> ProcessConfig {
        ProcessConfig::new(ProcessId(id), Duration::from_secs(1), Duration::from_secs(1))
    }

    #[test]
    fn test_request_rules_in_order() {
        let coord = Coordinator::new();
        coord.register_resource(ResourceId(0), "R0", 1).unwrap();
        coord.register_resource(ResourceId(1), "R1", 1).unwrap();
        coord.admit_process(config(0)).unwrap();
        coord.admit_process(config(1)).unwrap();

        assert!(coord
            .request_resource(ProcessId(0), ResourceId(0))
            .unwrap()
            .granted()
            .is_some());

        // holds the only unit of R0
        assert_eq!(
            coord
                .request_resource(ProcessId(0), ResourceId(0))
                .unwrap_err(),
            AllocationError::HoldsAllInstances {
                process: ProcessId(0),
                resource: ResourceId(0),
                held: 1
            }
        );

        // P1 blocks on R0, then asks for R1 while still waiting
        assert!(coord
            .request_resource(ProcessId(1), ResourceId(0))
            .unwrap()
            .is_blocked());
        assert_eq!(
            coord
                .request_resource(ProcessId(1), ResourceId(1))
                .unwrap_err(),
            AllocationError::ConcurrencyViolation {
                process: ProcessId(1),
                waiting_for: ResourceId(0),
                requested: ResourceId(1)
            }
        );
        assert_eq!(coord.waiting_for(ProcessId(1)), Some(ResourceId(0)));
        assert_eq!(coord.process_state(ProcessId(1)), Some(ProcessState::Blocked));
        assert!(coord.invariant_violations().is_empty());
    }

    #[test]
    fn test_unknown_ids() {
        let coord = Coordinator::new();
        coord.register_resource(ResourceId(0), "R0", 1).unwrap();
        assert_eq!(
            coord
                .request_resource(ProcessId(9), ResourceId(0))
                .unwrap_err(),
            AllocationError::UnknownProcess(ProcessId(9))
        );
        coord.admit_process(config(0)).unwrap();
        assert_eq!(
            coord
                .request_resource(ProcessId(0), ResourceId(5))
                .unwrap_err(),
            AllocationError::UnknownResource(ResourceId(5))
        );
    }

    #[test]
    fn test_admit_validates_timing() {
        let coord = Coordinator::new();
        let fast = ProcessConfig::new(
            ProcessId(0),
            Duration::from_millis(100),
            Duration::from_secs(1),
        );
        assert!(coord.admit_process(fast).is_err());
        assert!(coord.process_ids().is_empty());
    }

    #[test]
    fn test_stale_registration_cannot_touch_readmitted_id() {
        let coord = Coordinator::builder().with_max_processes(2).build();
        coord.register_resource(ResourceId(0), "R0", 1).unwrap();

        let first = coord.admit(config(0)).unwrap();
        coord.remove_process(ProcessId(0)).unwrap();
        let second = coord.admit(config(0)).unwrap();
        assert_ne!(first, second);

        assert_eq!(
            coord
                .request_as(ProcessId(0), first, ResourceId(0))
                .unwrap_err(),
            AllocationError::UnknownProcess(ProcessId(0))
        );
        assert!(coord.retire(ProcessId(0), first).is_none());
        assert!(coord.contains_process(ProcessId(0)));

        let instance = coord
            .request_as(ProcessId(0), second, ResourceId(0))
            .unwrap()
            .granted()
            .unwrap();
        assert!(coord.release_as(ProcessId(0), first, &instance).is_err());
        assert_eq!(coord.held_count(ProcessId(0), ResourceId(0)), 1);
        assert!(coord.retire(ProcessId(0), second).is_some());
        assert!(coord.invariant_violations().is_empty());
    }

    #[test]
    fn test_process_limit_from_builder() {
        let coord = Coordinator::builder().with_max_processes(1).build();
        coord.admit_process(config(0)).unwrap();
        assert_eq!(
            coord.admit_process(config(1)).unwrap_err(),
            crate::core::errors::ValidationError::ProcessCapacity { limit: 1 }
        );
    }

    #[test]
    fn test_remove_is_idempotent() {
        let coord = Coordinator::new();
        coord.admit_process(config(0)).unwrap();
        assert!(coord.remove_process(ProcessId(0)).is_some());
        assert!(coord.remove_process(ProcessId(0)).is_none());
        assert_eq!(coord.stats().removals, 1);
    }
}
