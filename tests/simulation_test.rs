/*!
 * Simulation Tests
 * Command surface, status queries and periodic detection
 */

use deadlock_sim::monitoring::LogEvent;
use deadlock_sim::simulation::{Scenario, Simulation, SimulationConfig};
use deadlock_sim::{SimError, ValidationError};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::time::sleep;

fn config(interval_secs: u64) -> SimulationConfig {
    SimulationConfig::default().with_detection_interval(Duration::from_secs(interval_secs))
}

#[tokio::test(start_paused = true)]
async fn test_commands_are_validated_and_logged() {
    let mut sim = Simulation::start(config(5));

    sim.add_resource(0, "Printer", 1).unwrap();
    assert!(matches!(
        sim.add_resource(0, "Printer", 1),
        Err(SimError::Validation(ValidationError::DuplicateResource(_)))
    ));
    assert!(sim.add_resource(1, "Scanner", 0).is_err());
    assert!(sim.add_resource(2, "   ", 1).is_err());

    assert!(matches!(
        sim.add_process(0, 0.2, 1.0),
        Err(SimError::Validation(ValidationError::RequestPeriodTooShort { .. }))
    ));
    assert!(sim.add_process(0, 1.0, 0.0).is_err());
    sim.add_process(0, 1.0, 1.0).unwrap();

    assert!(matches!(
        sim.remove_process(7),
        Err(SimError::Validation(ValidationError::UnknownProcess(_)))
    ));

    let rejected = sim
        .log()
        .find(|e| matches!(e, LogEvent::CommandRejected { .. }));
    assert_eq!(rejected.len(), 6);
    assert_eq!(sim.resource_summaries().len(), 1);
    assert_eq!(sim.process_statuses().len(), 1);

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_demo_reaches_deadlock_and_is_reported() {
    let mut sim = Simulation::start(config(1));
    sim.load_scenario(&Scenario::demo()).unwrap();

    sleep(Duration::from_secs(8)).await;

    let stats = sim.detector().stats();
    assert!(stats.cycles >= 7);
    assert!(stats.deadlocks_reported >= 1);

    let lines = sim.log_lines();
    assert!(lines.iter().any(|l| l.contains("DEADLOCK DETECTED")));
    assert!(lines[0].starts_with("[0.000s] Simulation started"));

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_status_report_and_shutdown() {
    let mut sim = Simulation::start(config(5));
    sim.add_resource(0, "R0", 2).unwrap();
    sim.add_process(0, 1.0, 30.0).unwrap();

    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(sim.status_lines(), vec!["Process 0 [running, using R0 (1)]".to_string()]);
    assert_eq!(sim.available_text(), "Available: R0: 1");
    let report = sim.status_report();
    assert!(report.contains("Allocation:"));
    assert!(report.contains("Request:"));

    sim.shutdown().await;
    assert!(sim.process_statuses().is_empty());
    assert_eq!(sim.available_text(), "Available: R0: 2");
    assert!(sim
        .log()
        .find(|e| matches!(e, LogEvent::SimulationStopped))
        .len()
        == 1);

    // second shutdown is a no-op
    sim.shutdown().await;
    assert_eq!(
        sim.log()
            .find(|e| matches!(e, LogEvent::SimulationStopped))
            .len(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_detection_control() {
    let mut sim = Simulation::start(config(60));
    sim.add_resource(0, "R0", 1).unwrap();
    sim.add_process(0, 1.0, 1.0).unwrap();

    sim.set_detection_interval(Duration::from_secs(1));
    sleep(Duration::from_millis(2_500)).await;
    assert_eq!(sim.detector().stats().cycles, 2);

    sim.pause_detection();
    sleep(Duration::from_secs(3)).await;
    assert_eq!(sim.detector().stats().cycles, 2);

    let report = sim.detect_now();
    assert_eq!(report.cycle, 3);
    assert_eq!(sim.last_report().map(|r| r.cycle), Some(3));

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_log_subscription_streams_records() {
    let mut sim = Simulation::start(config(5));
    let mut rx = sim.subscribe_log();

    sim.add_resource(3, "Disk", 4).unwrap();
    let record = rx.recv().await.unwrap();
    assert_eq!(record.to_string(), "[0.000s] Resource Disk (id 3) added with 4 instance(s)");

    sim.shutdown().await;
}
