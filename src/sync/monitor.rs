//! Periodic cycle driver
//!
//! Cycles start on a fixed period. A cycle always finishes before the next
//! tick is awaited, and ticks missed while a slow cycle ran are skipped, so
//! cycles never overlap. Shutdown is only observed between cycles.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::engine::{CycleReport, SyncEngine};
use crate::config::Config;
use crate::metrics;
use crate::models::Endpoint;

/// Runs [`SyncEngine`] cycles on a timer
pub struct Monitor {
    engine: SyncEngine,
    servers: Vec<Endpoint>,
    interval: Duration,
    /// Config file whose server list is re-read before every cycle
    config_path: Option<PathBuf>,
    /// Prometheus text file written after every cycle
    metrics_file: Option<PathBuf>,
}

impl Monitor {
    pub fn new(engine: SyncEngine, servers: Vec<Endpoint>, interval: Duration) -> Self {
        Self {
            engine,
            servers,
            interval,
            config_path: None,
            metrics_file: None,
        }
    }

    /// Pick up servers added to `path` by other processes
    pub fn with_config_reload(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Export metrics to `path` after every cycle
    pub fn with_metrics_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics_file = Some(path.into());
        self
    }

    pub fn servers(&self) -> &[Endpoint] {
        &self.servers
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Re-read the server list; a bad file keeps the current list
    fn refresh_servers(&mut self) {
        let Some(path) = &self.config_path else {
            return;
        };

        let config = match Config::from_file(path).and_then(|c| c.validate().map(|()| c)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %format!("{e:#}"),
                    "Config reload failed, keeping current server list"
                );
                return;
            }
        };

        if config.servers != self.servers {
            tracing::info!(
                before = self.servers.len(),
                after = config.servers.len(),
                "Server list changed"
            );
            self.servers = config.servers;
        }
    }

    /// Run a single cycle now
    pub async fn run_once(&mut self) -> CycleReport {
        self.refresh_servers();
        let report = self.engine.run_cycle(&self.servers).await;
        self.export_metrics();
        report
    }

    fn export_metrics(&self) {
        let Some(path) = &self.metrics_file else {
            return;
        };
        if !metrics::metrics_initialized() {
            return;
        }

        if let Err(e) = metrics::write_textfile(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to export metrics");
        }
    }

    /// Run cycles until `shutdown` completes; returns the number of cycles run
    pub async fn run_until<F>(&mut self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);
        let mut cycles = 0;

        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            servers = self.servers.len(),
            channel = self.engine.channel_name(),
            "Monitor started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let report = self.run_once().await;
            cycles += 1;

            if let Some(reason) = &report.skipped {
                tracing::warn!(cycle = cycles, reason = %reason, "Cycle skipped");
            }
        }

        tracing::info!(cycles, "Monitor stopped");
        cycles
    }

    /// Run cycles until Ctrl-C
    pub async fn run(&mut self) -> u64 {
        self.run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown requested"),
                Err(e) => tracing::error!(error = %e, "Cannot listen for Ctrl-C, stopping"),
            }
        })
        .await
    }
}
