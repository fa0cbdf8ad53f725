/*!
 * Deadlock Simulator - Main Entry Point
 *
 * Usage: deadlock-sim [INTERVAL_SECS] [SCENARIO.json]
 *
 * Starts the coordinator and detector, loads a scenario (or the built-in
 * demo), streams the event log to stdout and prints the status tables
 * periodically until Ctrl+C.
 */

use anyhow::Context;
use deadlock_sim::monitoring::{generate_run_id, run_span};
use deadlock_sim::simulation::parse_interval;
use deadlock_sim::{init_tracing, Scenario, Simulation, SimulationConfig};
use futures::StreamExt;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn, Instrument};

/// How often the status tables are printed
const STATUS_PERIOD: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured tracing
    init_tracing();

    let run_id = generate_run_id();
    run(std::env::args().skip(1).collect())
        .instrument(run_span(&run_id))
        .await
}

async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let mut config = SimulationConfig::from_env();
    if let Some(raw) = args.first() {
        config = config.with_detection_interval(parse_interval(raw));
    }

    let scenario = match args.get(1) {
        Some(path) => Scenario::from_path(path)
            .with_context(|| format!("Failed to load scenario {}", path))?,
        None => {
            info!("No scenario given, loading demo");
            Scenario::demo()
        }
    };

    info!("Deadlock simulator starting...");
    info!("================================================");

    let mut simulation = Simulation::start(config);

    // Print the event log as it is written
    let mut records = BroadcastStream::new(simulation.subscribe_log());
    let printer = tokio::spawn(async move {
        while let Some(item) = records.next().await {
            match item {
                Ok(record) => println!("{}", record),
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    warn!(skipped = n, "Log printer lagging");
                }
            }
        }
    });

    if let Err(e) = simulation.load_scenario(&scenario) {
        // individual rejections are already in the log
        warn!(error = %e, "Scenario partially loaded");
    }

    info!("Press Ctrl+C to exit");

    let mut status = tokio::time::interval(STATUS_PERIOD);
    status.tick().await;

    loop {
        tokio::select! {
            _ = status.tick() => {
                println!("{}", simulation.status_report());
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                info!("Shutdown requested");
                break;
            }
        }
    }

    simulation.shutdown().await;
    println!("{}", simulation.status_report());

    let stats = simulation.stats();
    let detection = simulation.detector().stats();
    info!(
        grants = stats.grants,
        denials = stats.denials,
        releases = stats.releases,
        cycles = detection.cycles,
        deadlocks = detection.deadlocks_reported,
        "Simulation summary"
    );

    drop(simulation);
    // the printer ends once every log sender is gone
    if tokio::time::timeout(Duration::from_secs(1), printer)
        .await
        .is_err()
    {
        warn!("Log printer did not finish in time");
    }

    Ok(())
}
