/*!
 * Detector Task - Periodic Deadlock Detection
 *
 * Background task that runs a detection cycle every interval. Control
 * commands can retune the interval, pause, resume or force a cycle without
 * restarting the task.
 *
 * Cycles only read a coordinator snapshot, so running one at any moment is
 * harmless: a paused detector still honours `Trigger`, which lets a view
 * inspect a frozen schedule on demand.
 */

use super::oneshot::DeadlockDetector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Control messages for the detector task
#[derive(Debug, Clone)]
pub enum DetectorCommand {
    /// Change the detection interval; the next cycle is one new period away
    UpdateInterval(Duration),
    /// Skip periodic cycles until resumed; ticks missed meanwhile are dropped
    Pause,
    /// Resume periodic cycles
    Resume,
    /// Run a cycle now, paused or not
    Trigger,
    /// Stop the task
    Shutdown,
}

/// Handle to the detector background task
pub struct DetectorTask {
    command_tx: mpsc::UnboundedSender<DetectorCommand>,
    handle: Option<tokio::task::JoinHandle<()>>,
    detector: Arc<DeadlockDetector>,
}

impl DetectorTask {
    /// Spawn the task on the current tokio runtime
    ///
    /// The first cycle runs one full interval after spawning.
    pub fn spawn(detector: Arc<DeadlockDetector>, period: Duration) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task_detector = Arc::clone(&detector);

        let handle = tokio::spawn(async move {
            run_detector_loop(task_detector, period, command_rx).await;
        });

        info!(interval_ms = period.as_millis() as u64, "Detector task spawned");

        Self {
            command_tx,
            handle: Some(handle),
            detector,
        }
    }

    pub fn update_interval(&self, period: Duration) {
        let _ = self
            .command_tx
            .send(DetectorCommand::UpdateInterval(period));
    }

    /// Stop periodic cycles; reports already logged stay in the log
    pub fn pause(&self) {
        let _ = self.command_tx.send(DetectorCommand::Pause);
    }

    pub fn resume(&self) {
        let _ = self.command_tx.send(DetectorCommand::Resume);
    }

    /// Run a detection cycle as soon as the task sees the command
    pub fn trigger(&self) {
        let _ = self.command_tx.send(DetectorCommand::Trigger);
    }

    pub fn detector(&self) -> &Arc<DeadlockDetector> {
        &self.detector
    }

    /// Shutdown the task gracefully
    pub async fn shutdown(mut self) {
        let _ = self.command_tx.send(DetectorCommand::Shutdown);

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Detector task shutdown error: {}", e);
            } else {
                info!("Detector task shutdown complete");
            }
        }
    }
}

fn detection_interval(period: Duration) -> Interval {
    // zero would make tokio panic
    let period = period.max(Duration::from_millis(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn run_detector_loop(
    detector: Arc<DeadlockDetector>,
    period: Duration,
    mut command_rx: mpsc::UnboundedReceiver<DetectorCommand>,
) {
    let mut active = true;
    let mut interval = detection_interval(period);
    info!(interval_ms = period.as_millis() as u64, "Detector loop started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if active {
                    detector.run_once();
                }
            }

            cmd = command_rx.recv() => {
                match cmd {
                    Some(DetectorCommand::UpdateInterval(period)) => {
                        info!(interval_ms = period.as_millis() as u64, "Detection interval updated");
                        interval = detection_interval(period);
                    }
                    Some(DetectorCommand::Pause) => {
                        info!("Detector paused");
                        active = false;
                    }
                    Some(DetectorCommand::Resume) => {
                        info!("Detector resumed");
                        active = true;
                    }
                    Some(DetectorCommand::Trigger) => {
                        debug!("Manual detection trigger");
                        detector.run_once();
                    }
                    Some(DetectorCommand::Shutdown) | None => {
                        info!("Detector task shutting down");
                        break;
                    }
                }
            }
        }
    }
}

impl Drop for DetectorTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.command_tx.send(DetectorCommand::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Coordinator;
    use crate::core::id::{ProcessId, ResourceId};
    use crate::process::ProcessConfig;

    fn detector() -> (Coordinator, Arc<DeadlockDetector>) {
        let coordinator = Coordinator::new();
        coordinator
            .register_resource(ResourceId(0), "R0", 1)
            .unwrap();
        coordinator
            .admit_process(ProcessConfig::new(
                ProcessId(0),
                Duration::from_secs(1),
                Duration::from_secs(1),
            ))
            .unwrap();
        let detector = Arc::new(DeadlockDetector::for_coordinator(&coordinator));
        (coordinator, detector)
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_every_interval() {
        let (_coord, detector) = detector();
        let task = DetectorTask::spawn(Arc::clone(&detector), Duration::from_secs(5));

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(detector.stats().cycles, 0);

        tokio::time::sleep(Duration::from_millis(10_200)).await;
        assert_eq!(detector.stats().cycles, 3);

        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_and_trigger() {
        let (_coord, detector) = detector();
        let task = DetectorTask::spawn(Arc::clone(&detector), Duration::from_secs(1));

        task.pause();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(detector.stats().cycles, 0);

        task.trigger();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(detector.stats().cycles, 1);

        task.resume();
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(detector.stats().cycles, 2);

        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_interval() {
        let (_coord, detector) = detector();
        let task = DetectorTask::spawn(Arc::clone(&detector), Duration::from_secs(60));

        task.update_interval(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(detector.stats().cycles, 2);

        task.shutdown().await;
    }
}
