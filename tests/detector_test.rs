/*!
 * Detector Tests
 * Verdicts over live coordinator state and the periodic task
 */

use deadlock_sim::coordinator::Coordinator;
use deadlock_sim::detector::{DeadlockDetector, DetectorTask, Verdict};
use deadlock_sim::monitoring::LogEvent;
use deadlock_sim::{ProcessConfig, ProcessId, ResourceId};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn setup(totals: &[u32], processes: u32) -> Coordinator {
    let coord = Coordinator::new();
    for (j, total) in totals.iter().enumerate() {
        coord
            .register_resource(ResourceId(j as u32), &format!("R{}", j), *total)
            .unwrap();
    }
    for i in 0..processes {
        coord
            .admit_process(ProcessConfig::new(
                ProcessId(i),
                Duration::from_secs(1),
                Duration::from_secs(1),
            ))
            .unwrap();
    }
    coord
}

#[test]
fn test_empty_systems_yield_no_finding() {
    let detector = DeadlockDetector::for_coordinator(&Coordinator::new());
    assert_eq!(detector.run_once().verdict, Verdict::Idle);

    // processes but no resources
    let coord = setup(&[], 2);
    let detector = DeadlockDetector::for_coordinator(&coord);
    assert_eq!(detector.run_once().verdict, Verdict::Idle);
    assert_eq!(coord.log().find(|e| matches!(e, LogEvent::SafeState { .. })).len(), 0);
}

#[test]
fn test_waiter_behind_holder_is_safe() {
    let coord = setup(&[1], 2);
    let held = coord
        .request_resource(ProcessId(0), ResourceId(0))
        .unwrap()
        .granted()
        .unwrap();
    assert!(coord
        .request_resource(ProcessId(1), ResourceId(0))
        .unwrap()
        .is_blocked());

    // P0 can finish, after which P1 can
    let detector = DeadlockDetector::for_coordinator(&coord);
    assert_eq!(
        detector.run_once().verdict,
        Verdict::Safe {
            sequence: vec![ProcessId(0), ProcessId(1)]
        }
    );

    // removal frees the unit; the waiter's request now fits
    coord.remove_process(ProcessId(0));
    assert!(coord.release_resource(ProcessId(0), &held).is_err());
    assert_eq!(
        detector.run_once().verdict,
        Verdict::Safe {
            sequence: vec![ProcessId(1)]
        }
    );
    assert_eq!(detector.stats().deadlocks_reported, 0);
}

#[test]
fn test_safe_state_is_logged_with_sequence() {
    let coord = setup(&[1, 1], 2);
    coord.request_resource(ProcessId(0), ResourceId(0)).unwrap();
    coord.request_resource(ProcessId(1), ResourceId(1)).unwrap();

    DeadlockDetector::for_coordinator(&coord).run_once();
    let lines: Vec<String> = coord
        .log()
        .find(|e| matches!(e, LogEvent::SafeState { .. }))
        .iter()
        .map(|r| r.event.to_string())
        .collect();
    assert_eq!(
        lines,
        vec!["System is in a safe state (sequence: 0, 1)".to_string()]
    );
}

#[test]
fn test_bystander_is_not_reported() {
    let coord = setup(&[1, 1, 1], 3);
    coord.request_resource(ProcessId(0), ResourceId(0)).unwrap();
    coord.request_resource(ProcessId(1), ResourceId(1)).unwrap();
    coord.request_resource(ProcessId(2), ResourceId(2)).unwrap();
    coord.request_resource(ProcessId(0), ResourceId(1)).unwrap();
    coord.request_resource(ProcessId(1), ResourceId(0)).unwrap();

    let report = DeadlockDetector::for_coordinator(&coord).run_once();
    assert_eq!(report.verdict.deadlocked(), &[ProcessId(0), ProcessId(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_task_reports_each_interval() {
    let coord = setup(&[1, 1], 2);
    coord.request_resource(ProcessId(0), ResourceId(0)).unwrap();
    coord.request_resource(ProcessId(1), ResourceId(1)).unwrap();
    coord.request_resource(ProcessId(0), ResourceId(1)).unwrap();
    coord.request_resource(ProcessId(1), ResourceId(0)).unwrap();

    let detector = Arc::new(DeadlockDetector::for_coordinator(&coord));
    let task = DetectorTask::spawn(Arc::clone(&detector), Duration::from_secs(2));

    tokio::time::sleep(Duration::from_millis(6_500)).await;
    assert_eq!(detector.stats().cycles, 3);
    assert_eq!(detector.stats().deadlocks_reported, 3);
    assert_eq!(
        coord
            .log()
            .find(|e| matches!(e, LogEvent::DeadlockDetected { .. }))
            .len(),
        3
    );

    task.shutdown().await;
}
