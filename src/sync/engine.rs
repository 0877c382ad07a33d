//! Per-cycle status synchronization
//!
//! One cycle takes every configured endpoint through
//!
//! ```text
//! Probing ─▶ Unreachable ─────────────────┐
//!        └─▶ Reachable ─▶ FetchingMeta ───┴─▶ Building ─▶ Publishing ─▶ Done | Failed
//! ```
//!
//! Snapshots are produced with bounded parallelism, in configuration order.
//! Publishing then runs sequentially on the cycle's task, which is the only
//! writer of the [`BindingStore`]; this keeps at most one report per endpoint.

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::channel::{ChannelError, ChannelResult, PublishChannel};
use crate::config::Config;
use crate::error::{ErrorCategory, WatchErrorTrait};
use crate::geo::GeoResolver;
use crate::metrics;
use crate::models::{Endpoint, ReportId, StatusSnapshot};
use crate::probe::{Prober, DEFAULT_PROBE_TIMEOUT};
use crate::query::MetadataFetcher;
use crate::report::{AssetResolver, Report, ReportBuilder};
use crate::storage::BindingStore;
use crate::utils::retry::{with_retry_if, RetryAdvice, RetryConfig};

/// Tunables of the engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Liveness probe timeout
    pub probe_timeout: Duration,
    /// Rate-limit retry policy for channel calls
    pub retry: RetryConfig,
    /// Endpoints snapshotted at the same time
    pub max_concurrent_probes: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            retry: RetryConfig::default(),
            max_concurrent_probes: 4,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            probe_timeout: config.probe_timeout(),
            retry: RetryConfig::with_default_wait(config.default_retry_after()),
            max_concurrent_probes: config.monitor.max_concurrent_probes.max(1),
        }
    }
}

/// Collaborators that observe an endpoint
#[derive(Clone)]
pub struct SnapshotSources {
    pub prober: Arc<dyn Prober>,
    pub fetcher: Arc<dyn MetadataFetcher>,
    pub geo: Arc<dyn GeoResolver>,
    pub assets: Arc<dyn AssetResolver>,
}

/// What happened to one endpoint's report in a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// New report published and its binding persisted
    Created { id: ReportId, retried: bool },
    /// Existing report edited in place
    Updated { retried: bool },
    /// Bound report was gone; binding removed, recreated next cycle
    Stale { id: ReportId },
    /// Unreachable and never published; the first report waits until it is seen online
    Deferred,
    /// New report published but its binding could not be persisted
    Orphaned { id: ReportId, message: String },
    /// Channel call failed; abandoned until the next cycle
    Failed {
        category: ErrorCategory,
        message: String,
    },
}

impl PublishOutcome {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Stale { .. } => "stale",
            Self::Deferred => "deferred",
            Self::Orphaned { .. } => "orphaned",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether a rate-limit retry was needed
    pub fn retried(&self) -> bool {
        matches!(
            self,
            Self::Created { retried: true, .. } | Self::Updated { retried: true }
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Orphaned { .. } | Self::Failed { .. })
    }
}

/// Result of one endpoint in a cycle
#[derive(Debug, Clone)]
pub struct EndpointOutcome {
    pub endpoint: String,
    pub reachable: bool,
    pub outcome: PublishOutcome,
}

/// Summary of one cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Per-endpoint results in configuration order
    pub outcomes: Vec<EndpointOutcome>,
    /// Why the cycle did not run, if it did not
    pub skipped: Option<String>,
    pub duration: Duration,
}

impl CycleReport {
    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            skipped: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    /// Outcome of the named endpoint
    pub fn outcome(&self, endpoint: &str) -> Option<&PublishOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.endpoint == endpoint)
            .map(|o| &o.outcome)
    }

    pub fn reachable_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.reachable).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_failure()).count()
    }
}

/// Keeps one published report per endpoint in sync with observed state
pub struct SyncEngine {
    sources: SnapshotSources,
    channel: Arc<dyn PublishChannel>,
    builder: ReportBuilder,
    bindings_path: PathBuf,
    settings: EngineSettings,
}

impl SyncEngine {
    pub fn new(
        sources: SnapshotSources,
        channel: Arc<dyn PublishChannel>,
        builder: ReportBuilder,
        bindings_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sources,
            channel,
            builder,
            bindings_path: bindings_path.into(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn bindings_path(&self) -> &Path {
        &self.bindings_path
    }

    pub fn channel_name(&self) -> &str {
        self.channel.name()
    }

    /// Observe one endpoint
    ///
    /// Never fails: an unreachable endpoint or a failed lookup degrades the
    /// snapshot instead.
    pub async fn snapshot(&self, endpoint: &Endpoint) -> StatusSnapshot {
        let reachable = self
            .sources
            .prober
            .probe(endpoint, self.settings.probe_timeout)
            .await;
        metrics::set_endpoint_reachable(&endpoint.name, reachable);

        let region = self.sources.geo.resolve(&endpoint.ip).await;

        if !reachable {
            tracing::debug!(endpoint = %endpoint.name, "Endpoint unreachable");
            return StatusSnapshot::unreachable(
                endpoint.clone(),
                region,
                self.sources.assets.default_asset(),
            );
        }

        let metadata = match self.sources.fetcher.fetch(endpoint).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(
                    endpoint = %endpoint.name,
                    error = %e,
                    category = e.category().as_str(),
                    "Metadata unavailable"
                );
                metrics::record_metadata_failure(&endpoint.name);
                None
            }
        };

        StatusSnapshot::reachable(endpoint.clone(), metadata, region, |activity| {
            self.sources.assets.resolve(activity)
        })
    }

    /// Run one full cycle over `endpoints`
    pub async fn run_cycle(&self, endpoints: &[Endpoint]) -> CycleReport {
        let _timer = metrics::start_cycle_timer();
        let started = Instant::now();

        // Publishing without bindings would duplicate every report
        let mut store = match BindingStore::load(&self.bindings_path) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    category = e.category().as_str(),
                    "Cannot load bindings, skipping cycle"
                );
                metrics::record_cycle("skipped");
                return CycleReport::skipped(e.to_string());
            }
        };

        let snapshots: Vec<StatusSnapshot> = stream::iter(endpoints)
            .map(|endpoint| self.snapshot(endpoint))
            .buffered(self.settings.max_concurrent_probes.max(1))
            .collect()
            .await;

        let mut report = CycleReport::default();

        for snapshot in snapshots {
            let rendered = self.builder.build(&snapshot);
            let outcome = self.publish(&mut store, &snapshot, &rendered).await;

            metrics::record_publish_outcome(&snapshot.endpoint.name, outcome.as_str());
            report.outcomes.push(EndpointOutcome {
                endpoint: snapshot.endpoint.name.clone(),
                reachable: snapshot.reachable,
                outcome,
            });
        }

        report.duration = started.elapsed();
        metrics::record_cycle("completed");

        tracing::info!(
            endpoints = report.outcomes.len(),
            reachable = report.reachable_count(),
            failures = report.failure_count(),
            duration_ms = report.duration.as_millis() as u64,
            "Cycle finished"
        );

        report
    }

    /// Create or update the endpoint's bound report
    async fn publish(
        &self,
        store: &mut BindingStore,
        snapshot: &StatusSnapshot,
        report: &Report,
    ) -> PublishOutcome {
        let endpoint = &snapshot.endpoint;

        match store.get(endpoint.identity()) {
            Some(id) => self.update_bound(store, endpoint, id, report).await,
            None if !snapshot.reachable => {
                tracing::debug!(
                    endpoint = %endpoint.name,
                    "Unreachable and unpublished, deferring"
                );
                PublishOutcome::Deferred
            }
            None => self.create_bound(store, endpoint, report).await,
        }
    }

    async fn update_bound(
        &self,
        store: &mut BindingStore,
        endpoint: &Endpoint,
        id: ReportId,
        report: &Report,
    ) -> PublishOutcome {
        let attempted = with_retry_if(
            &self.settings.retry,
            || self.fetch_and_update(id, report),
            rate_limit_advice,
        )
        .await;
        let retried = attempted.retried();

        match attempted.result {
            Ok(()) => {
                tracing::debug!(
                    endpoint = %endpoint.name,
                    report_id = %id,
                    retried,
                    "Report updated"
                );
                PublishOutcome::Updated { retried }
            }
            Err(ChannelError::NotFound) => {
                tracing::warn!(
                    endpoint = %endpoint.name,
                    report_id = %id,
                    "Bound report no longer exists, dropping binding"
                );
                store.remove(endpoint.identity());
                if let Err(e) = store.persist() {
                    tracing::error!(
                        endpoint = %endpoint.name,
                        error = %e,
                        "Failed to persist bindings"
                    );
                    metrics::record_persistence_failure();
                }
                PublishOutcome::Stale { id }
            }
            Err(e) => failed(endpoint, &e),
        }
    }

    async fn create_bound(
        &self,
        store: &mut BindingStore,
        endpoint: &Endpoint,
        report: &Report,
    ) -> PublishOutcome {
        let attempted = with_retry_if(
            &self.settings.retry,
            || self.channel.create(report),
            rate_limit_advice,
        )
        .await;
        let retried = attempted.retried();

        let id = match attempted.result {
            Ok(id) => id,
            Err(e) => return failed(endpoint, &e),
        };

        store.upsert(endpoint.identity(), id);

        match store.persist() {
            Ok(()) => {
                tracing::info!(endpoint = %endpoint.name, report_id = %id, "Report created");
                PublishOutcome::Created { id, retried }
            }
            Err(e) => {
                tracing::error!(
                    endpoint = %endpoint.name,
                    report_id = %id,
                    error = %e,
                    "Failed to persist binding, report is orphaned"
                );
                metrics::record_persistence_failure();
                PublishOutcome::Orphaned {
                    id,
                    message: e.to_string(),
                }
            }
        }
    }

    async fn fetch_and_update(&self, id: ReportId, report: &Report) -> ChannelResult<()> {
        let handle = self.channel.fetch(id).await?;
        self.channel.update(&handle, report).await
    }

    /// Current report of one endpoint, without touching the bindings
    pub async fn status_report(&self, endpoint: &Endpoint) -> Report {
        let snapshot = self.snapshot(endpoint).await;
        self.builder.build(&snapshot)
    }

    /// Post the current report as a new message that is never bound or updated
    pub async fn publish_ephemeral(&self, endpoint: &Endpoint) -> ChannelResult<ReportId> {
        let report = self.status_report(endpoint).await;

        let attempted = with_retry_if(
            &self.settings.retry,
            || self.channel.create(&report),
            rate_limit_advice,
        )
        .await;

        let id = attempted.result?;
        tracing::info!(endpoint = %endpoint.name, report_id = %id, "One-shot report published");
        Ok(id)
    }
}

fn rate_limit_advice(error: &ChannelError) -> RetryAdvice {
    match error {
        ChannelError::RateLimited { retry_after } => {
            metrics::record_rate_limit();
            RetryAdvice::RetryAfter(*retry_after)
        }
        _ => RetryAdvice::Stop,
    }
}

fn failed(endpoint: &Endpoint, error: &ChannelError) -> PublishOutcome {
    tracing::warn!(
        endpoint = %endpoint.name,
        error = %error,
        category = error.category().as_str(),
        "Publishing failed, retrying next cycle"
    );
    PublishOutcome::Failed {
        category: error.category(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(
            PublishOutcome::Created {
                id: ReportId(1),
                retried: false
            }
            .as_str(),
            "created"
        );
        assert!(PublishOutcome::Updated { retried: true }.retried());
        assert!(!PublishOutcome::Stale { id: ReportId(1) }.is_failure());
        assert!(PublishOutcome::Failed {
            category: ErrorCategory::Channel,
            message: String::new()
        }
        .is_failure());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.monitor.max_concurrent_probes = 0;
        config.monitor.default_retry_after_ms = 250;

        let settings = EngineSettings::from_config(&config);
        assert_eq!(settings.max_concurrent_probes, 1);
        assert_eq!(settings.retry.default_wait, Duration::from_millis(250));
        assert_eq!(settings.retry.max_retries, 1);
    }

    #[test]
    fn test_skipped_cycle_report() {
        let report = CycleReport::skipped("unreadable");
        assert!(report.is_skipped());
        assert!(report.outcome("Alpha").is_none());
        assert_eq!(report.failure_count(), 0);
    }
}
