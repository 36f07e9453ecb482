mod command_line;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use command_line::Args;
use replica_recovery::utils::file_io;
use replica_recovery::Result;
use replica_recovery::ScenarioConfig;
use replica_recovery::ScenarioOrchestrator;
use replica_recovery::ScenarioReport;
use replica_recovery::SimulatedCluster;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::from(2);
        }
    };

    // Initializing Logs
    let _guard = match init_observability(config.cluster.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return ExitCode::from(2);
        }
    };
    info!(?config, "configuration loaded");

    let cluster = match build_cluster(&config) {
        Ok(cluster) => Arc::new(cluster),
        Err(e) => {
            error!("failed to prepare the cluster: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(root = %cluster.root().display(), "running against the simulated cluster");

    // Initializing Shutdown Signal
    let (graceful_tx, mut graceful_rx) = watch::channel(());
    tokio::spawn(async move {
        shutdown_signal().await;
        if graceful_tx.send(()).is_err() {
            debug!("scenario already finished, shutdown signal ignored");
        }
    });
    let shutdown = async move {
        if graceful_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let orchestrator = ScenarioOrchestrator::new(config, cluster.clone(), cluster);
    match orchestrator.run_until(shutdown).await {
        Ok(report) => {
            log_report(&report);
            ExitCode::SUCCESS
        }
        Err(failure) => {
            error!("{}", failure);
            if let Some(teardown_error) = &failure.teardown_error {
                error!("teardown also failed: {}", teardown_error);
            }
            if failure.error.is_interrupted() {
                ExitCode::from(130)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn build_cluster(config: &ScenarioConfig) -> Result<SimulatedCluster> {
    match &config.cluster.work_dir {
        Some(work_dir) => {
            std::fs::create_dir_all(work_dir)?;
            Ok(SimulatedCluster::new(work_dir, config.simulation.clone()))
        }
        None => SimulatedCluster::in_temp_dir(config.simulation.clone()),
    }
}

fn log_report(report: &ScenarioReport) {
    for record in &report.phases {
        info!("{:<28} {:>8.2}s", record.phase.as_str(), record.elapsed.as_secs_f64());
    }
    info!(
        "scenario passed: {} rows loaded, {} replicas still catching up, {:.2}s total",
        report.rows_loaded,
        report.final_status.lagging_replicas().len(),
        report.total_elapsed.as_secs_f64()
    );
}

/// Stdout logging filtered by `RUST_LOG` (default `info`), plus a log file
/// under `log_dir` when one is configured.
pub fn init_observability(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(env_filter());

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let log_file = file_io::open_file_for_append(&dir.join("replica-recovery.log"))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(env_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(stdout_layer).with(file_layer).init();
    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

async fn shutdown_signal() {
    let (mut sigint, mut sigterm) = match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        _ => {
            warn!("unix signal handlers unavailable, listening for Ctrl+C only");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            return;
        }
    };
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }
}
