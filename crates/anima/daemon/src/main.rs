//! Anima daemon
//!
//! Runs one life on a dedicated loop thread:
//! - events arrive as JSON lines on stdin
//! - the life status is logged at a fixed interval
//! - snapshots and the runtime log go to the configured backends
//! - Ctrl-C (or SIGTERM) stops the loop after the current tick, takes a
//!   final snapshot and flushes the log

use std::time::Duration;

use anima_runtime::{LifeRuntime, RuntimeHandle};
use anima_state::{StateField, TrendDirection, TrendSummary};
use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod backends;
mod config;
mod feed;

use backends::{LogBackend, SnapshotBackend};
use config::DaemonConfig;

/// Anima daemon CLI
#[derive(Parser)]
#[command(name = "animad")]
#[command(about = "Anima daemon - runs one life, fed by JSON-line events on stdin", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ANIMA_CONFIG")]
    config: Option<String>,

    /// Log level
    #[arg(long, env = "ANIMA_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "ANIMA_LOG_JSON")]
    json: bool,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Continue from the newest snapshot instead of starting a new life
    #[arg(long)]
    restore: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let result = runtime.block_on(run(cli));
    // The stdin reader may still be parked on a blocking read.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = DaemonConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(ticks) = cli.ticks {
        config.life.runtime.max_ticks = Some(ticks);
    }
    config.life.validate()?;

    let snapshots = SnapshotBackend::from_config(&config.life).context("failed to open snapshot store")?;
    let logs = LogBackend::from_config(&config.life).context("failed to open runtime log")?;
    let (sender, source) = anima_policies::channel();
    let collaborators = anima_policies::baseline(source, &config.policies)?;

    info!(
        snapshots = %snapshots.describe(),
        restore = cli.restore,
        max_ticks = ?config.life.runtime.max_ticks,
        "Starting anima daemon"
    );

    let life = if cli.restore {
        LifeRuntime::restore(config.life.clone(), collaborators, snapshots, logs)?
    } else {
        LifeRuntime::builder(config.life.clone())
            .collaborators(collaborators)
            .persister(snapshots)
            .flusher(logs)
            .build()?
    };

    let handle = life.spawn()?;
    let feeder = tokio::spawn(feed::feed_events(
        tokio::io::BufReader::new(tokio::io::stdin()),
        sender,
    ));

    supervise(&handle, config.daemon.status_interval_secs).await;

    handle.stop();
    feeder.abort();
    let life = tokio::task::spawn_blocking(move || handle.join())
        .await
        .context("loop supervisor task failed")??;

    let status = life.state().status();
    info!(
        tick = status.tick,
        energy = status.vitals.energy,
        memories = life.memory().len(),
        archived = life.memory().archive().len(),
        snapshots = life.snapshots().taken(),
        "Anima daemon stopped"
    );
    Ok(())
}

/// Log status until a shutdown signal arrives or the loop ends by itself.
async fn supervise(handle: &RuntimeHandle, status_interval_secs: u64) {
    let mut status = tokio::time::interval(Duration::from_secs(status_interval_secs.max(1)));
    let mut liveness = tokio::time::interval(Duration::from_millis(200));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = status.tick() => log_status(handle),
            _ = liveness.tick() => {
                if handle.is_finished() {
                    info!("Life loop finished");
                    break;
                }
            }
        }
    }
}

fn log_status(handle: &RuntimeHandle) {
    let status = handle.state().status();
    let telemetry = handle.telemetry();
    info!(
        phase = ?handle.phase(),
        tick = status.tick,
        energy = status.vitals.energy,
        integrity = status.vitals.integrity,
        stability = status.vitals.stability,
        fatigue = status.fatigue,
        tension = status.tension,
        subjective_time = status.subjective_time,
        energy_trend = ?direction(&status.vital_trends, StateField::Energy),
        stability_trend = ?direction(&status.vital_trends, StateField::Stability),
        fatigue_trend = ?direction(&status.internal_dynamics, StateField::Fatigue),
        tension_trend = ?direction(&status.internal_dynamics, StateField::Tension),
        energy_mean = ?status.energy_history.mean,
        stability_mean = ?status.stability_history.mean,
        events = telemetry.counter(anima_runtime::telemetry::EVENTS_PROCESSED),
        failures = telemetry.counter(anima_runtime::telemetry::STAGE_FAILURES),
        "Life status"
    );
    for trend in status.vital_trends.iter().chain(&status.internal_dynamics) {
        debug!(
            field = %trend.field,
            direction = ?trend.direction,
            average_rate = trend.average_rate,
            volatility = trend.volatility,
            samples = trend.samples,
            "Trend"
        );
    }
}

fn direction(trends: &[TrendSummary], field: StateField) -> Option<TrendDirection> {
    trends.iter().find(|t| t.field == field).map(|t| t.direction)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping life loop");
        }
        _ = terminate => {
            info!("Received terminate signal, stopping life loop");
        }
    }
}
