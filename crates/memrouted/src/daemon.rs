//! Long-running mode: build the scheduler and keep it alive.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use memroute_core::MemrouteConfig;
use memroute_log::LogHandles;
use memroute_scheduler::{Scheduler, build_scheduler};
use tokio::sync::watch;
use tracing::{info, warn};

pub async fn run(config_path: &Path, stats_interval: u64) -> anyhow::Result<()> {
    let config = MemrouteConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let logs = memroute_log::init(&config.log)?;

    info!(config = %config_path.display(), "memroute daemon starting");

    let scheduler = build_scheduler(&config.scheduler, &config.discovery, &config.host)?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background tasks ───────────────────────────────────────

    let stats_handle = tokio::spawn(log_stats(
        scheduler.clone(),
        Duration::from_secs(stats_interval.max(1)),
        shutdown_rx.clone(),
    ));
    let reopen_handle = tokio::spawn(reopen_on_hangup(logs, shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("installing Ctrl-C handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = stats_handle.await;
    let _ = reopen_handle.await;
    drop(scheduler);

    info!("memroute daemon stopped");
    Ok(())
}

/// Log the scheduler's per-host weights every `interval`.
async fn log_stats(
    scheduler: Arc<dyn Scheduler>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_secs = interval.as_secs(), "stats logger started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let mut stats: Vec<_> = scheduler.stats().into_iter().collect();
                stats.sort_by(|a, b| a.0.cmp(&b.0));
                for (host, weights) in stats {
                    info!(host = %host, ?weights, "scheduler stats");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Reopen log files whenever the process receives SIGHUP.
#[cfg(unix)]
async fn reopen_on_hangup(logs: LogHandles, mut shutdown: watch::Receiver<bool>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGHUP, log reopening disabled");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = hangup.recv() => match logs.reopen() {
                Ok(()) => info!("log files reopened"),
                Err(e) => warn!(error = %e, "log reopen failed"),
            },
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(not(unix))]
async fn reopen_on_hangup(_logs: LogHandles, mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.changed().await;
}
