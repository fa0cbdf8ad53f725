/*!
 * Simulation
 *
 * Command and status surface over a coordinator and its periodic detector.
 * Commands are validated before they reach coordinator state; a rejected
 * command is logged and returned to the caller, and never stops the
 * simulation.
 */

use super::config::SimulationConfig;
use super::scenario::Scenario;
use crate::coordinator::{AllocationSnapshot, Coordinator, CoordinatorStats, ProcessStatus, RemovalReport};
use crate::core::errors::{SimError, SimResult, ValidationError};
use crate::core::id::{ProcessId, ResourceId};
use crate::detector::{DeadlockDetector, DetectionReport, DetectorTask};
use crate::monitoring::{EventLog, LogEvent, LogRecord};
use crate::process::ProcessConfig;
use crate::resource::ResourceSummary;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub struct Simulation {
    config: SimulationConfig,
    coordinator: Coordinator,
    detector: Arc<DeadlockDetector>,
    task: Option<DetectorTask>,
}

impl Simulation {
    /// Build the coordinator and start the detector task
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: SimulationConfig) -> Self {
        let log = EventLog::with_capacity(config.log_history);
        let coordinator = Coordinator::builder()
            .with_log(log.clone())
            .with_settings(config.coordinator_settings())
            .build();

        let detector = Arc::new(DeadlockDetector::for_coordinator(&coordinator));
        let task = DetectorTask::spawn(Arc::clone(&detector), config.detection_interval);

        log.append(LogEvent::SimulationStarted {
            interval_secs: config.detection_interval.as_secs(),
        });
        info!(
            interval_secs = config.detection_interval.as_secs(),
            "Simulation started"
        );

        Self {
            config,
            coordinator,
            detector,
            task: Some(task),
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub fn add_resource(&self, id: u32, name: &str, total: u32) -> SimResult<()> {
        self.coordinator
            .register_resource(ResourceId(id), name.trim(), total)
            .map(|_| ())
            .map_err(|e| self.reject("add resource", e))
    }

    /// Add a process and start its actor
    pub fn add_process(&self, id: u32, request_period_secs: f64, hold_secs: f64) -> SimResult<()> {
        let config = ProcessConfig::from_secs(id, request_period_secs, hold_secs)
            .map_err(|e| self.reject("add process", e))?;
        self.add_process_config(config)
    }

    /// Same as `add_process` with a full configuration (policy, seed)
    pub fn add_process_config(&self, config: ProcessConfig) -> SimResult<()> {
        self.coordinator
            .register_process(config)
            .map_err(|e| self.reject("add process", e))
    }

    /// Stop a process, force-releasing everything it holds
    pub fn remove_process(&self, id: u32) -> SimResult<RemovalReport> {
        let id = ProcessId(id);
        self.coordinator
            .remove_process(id)
            .ok_or_else(|| self.reject("remove process", ValidationError::UnknownProcess(id)))
    }

    /// Register every resource, then every process, of a scenario
    ///
    /// Stops at the first rejected entry; earlier entries stay registered.
    pub fn load_scenario(&self, scenario: &Scenario) -> SimResult<()> {
        for resource in &scenario.resources {
            self.add_resource(resource.id, &resource.name, resource.total)?;
        }
        for process in &scenario.processes {
            let mut config =
                ProcessConfig::from_secs(process.id, process.request_period_secs, process.hold_secs)
                    .map_err(|e| self.reject("add process", e))?
                    .with_policy(process.policy.clone());
            if let Some(seed) = process.seed {
                config = config.with_seed(seed);
            }
            self.add_process_config(config)?;
        }
        info!(
            resources = scenario.resources.len(),
            processes = scenario.processes.len(),
            "Scenario loaded"
        );
        Ok(())
    }

    fn reject(&self, command: &str, error: ValidationError) -> SimError {
        warn!(command, error = %error, "Command rejected");
        self.coordinator.log().append(LogEvent::CommandRejected {
            command: command.to_string(),
            reason: error.to_string(),
        });
        SimError::Validation(error)
    }

    // =========================================================================
    // Detection control
    // =========================================================================

    pub fn set_detection_interval(&mut self, interval: Duration) {
        self.config.detection_interval = interval;
        if let Some(task) = &self.task {
            task.update_interval(interval);
        }
    }

    pub fn pause_detection(&self) {
        if let Some(task) = &self.task {
            task.pause();
        }
    }

    pub fn resume_detection(&self) {
        if let Some(task) = &self.task {
            task.resume();
        }
    }

    /// Run a detection cycle immediately, outside the periodic schedule
    pub fn detect_now(&self) -> DetectionReport {
        self.detector.run_once()
    }

    pub fn last_report(&self) -> Option<DetectionReport> {
        self.detector.last_report()
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub fn resource_summaries(&self) -> Vec<ResourceSummary> {
        self.coordinator.resource_summaries()
    }

    pub fn process_statuses(&self) -> Vec<ProcessStatus> {
        self.coordinator.process_statuses()
    }

    /// One line per process, e.g. `Process 3 [blocked, awaiting R1]`
    pub fn status_lines(&self) -> Vec<String> {
        self.process_statuses()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub fn snapshot(&self) -> AllocationSnapshot {
        self.coordinator.snapshot()
    }

    pub fn allocation_text(&self) -> String {
        self.snapshot().render_allocation()
    }

    pub fn request_text(&self) -> String {
        self.snapshot().render_request()
    }

    pub fn available_text(&self) -> String {
        self.snapshot().render_available()
    }

    /// Resources, processes and all three tables from one snapshot
    pub fn status_report(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        let _ = writeln!(out, "Resources:");
        for resource in &snapshot.resources {
            let _ = writeln!(out, "  {}", resource);
        }
        let _ = writeln!(out, "Processes:");
        for status in self.process_statuses() {
            let _ = writeln!(out, "  {}", status);
        }
        let _ = writeln!(out, "Allocation:\n{}", snapshot.render_allocation());
        let _ = writeln!(out, "Request:\n{}", snapshot.render_request());
        let _ = write!(out, "{}", snapshot.render_available());
        out
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    // =========================================================================
    // Log stream
    // =========================================================================

    pub fn subscribe_log(&self) -> broadcast::Receiver<LogRecord> {
        self.coordinator.log().subscribe()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.coordinator.log().lines()
    }

    pub fn log(&self) -> &EventLog {
        self.coordinator.log()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn detector(&self) -> &Arc<DeadlockDetector> {
        &self.detector
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Stop detection and remove every process
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.shutdown().await;

        let removed = self.coordinator.remove_all();
        self.coordinator.log().append(LogEvent::SimulationStopped);
        info!(removed, "Simulation stopped");
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.coordinator.remove_all();
        }
    }
}
