//! Common test utilities
//!
//! In-memory stand-ins for the engine's collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serverwatch::channel::{ChannelError, ChannelResult, PublishChannel, ReportHandle};
use serverwatch::geo::GeoResolver;
use serverwatch::i18n::Locale;
use serverwatch::models::{Endpoint, RegionLabel, ReportId, ServerMetadata};
use serverwatch::probe::Prober;
use serverwatch::query::MetadataFetcher;
use serverwatch::report::{FsAssetResolver, Report, ReportBuilder};
use serverwatch::sync::{SnapshotSources, SyncEngine};
use serverwatch::utils::error::QueryError;

/// Endpoint used throughout the tests
pub fn alpha() -> Endpoint {
    Endpoint::new("Alpha", "10.0.0.5", 27015, "steam://connect/10.0.0.5:27015")
}

pub fn bravo() -> Endpoint {
    Endpoint::new("Bravo", "10.0.0.6", 27016, "steam://connect/10.0.0.6:27016")
}

/// Metadata with a map and player names
pub fn metadata(map: &str, players: &[&str]) -> ServerMetadata {
    ServerMetadata {
        activity: map.to_string(),
        participants: players.iter().map(|p| p.to_string()).collect(),
        ..Default::default()
    }
}

/// Reachability decided by endpoint name
#[derive(Default)]
pub struct FakeProber {
    down: Mutex<HashSet<String>>,
}

impl FakeProber {
    pub fn all_up() -> Self {
        Self::default()
    }

    pub fn down(names: &[&str]) -> Self {
        let prober = Self::default();
        for name in names {
            prober.set_down(name, true);
        }
        prober
    }

    pub fn set_down(&self, name: &str, down: bool) {
        let mut set = self.down.lock().unwrap();
        if down {
            set.insert(name.to_string());
        } else {
            set.remove(name);
        }
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, endpoint: &Endpoint, _timeout: Duration) -> bool {
        !self.down.lock().unwrap().contains(&endpoint.name)
    }
}

/// Metadata by endpoint name; missing entries fail like a silent server
#[derive(Default)]
pub struct FakeFetcher {
    replies: HashMap<String, ServerMetadata>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, metadata: ServerMetadata) -> Self {
        self.replies.insert(name.to_string(), metadata);
        self
    }
}

#[async_trait]
impl MetadataFetcher for FakeFetcher {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<ServerMetadata, QueryError> {
        self.replies
            .get(&endpoint.name)
            .cloned()
            .ok_or(QueryError::Timeout(Duration::from_secs(3)))
    }
}

/// Always answers with the same region
pub struct FakeGeo(pub RegionLabel);

impl FakeGeo {
    pub fn us() -> Self {
        Self(RegionLabel::known("US", "🇺🇸 USA"))
    }
}

#[async_trait]
impl GeoResolver for FakeGeo {
    async fn resolve(&self, _ip: &str) -> RegionLabel {
        self.0.clone()
    }
}

/// Failure the recording channel returns instead of succeeding
#[derive(Debug, Clone)]
pub enum Scripted {
    RateLimited(Option<Duration>),
    NotFound,
    Status(u16),
}

impl Scripted {
    fn into_error(self) -> ChannelError {
        match self {
            Self::RateLimited(retry_after) => ChannelError::RateLimited { retry_after },
            Self::NotFound => ChannelError::NotFound,
            Self::Status(status) => ChannelError::Status {
                status,
                body: "scripted".to_string(),
            },
        }
    }
}

#[derive(Default)]
struct ChannelState {
    next_id: u64,
    existing: HashSet<ReportId>,
    created: Vec<(ReportId, Report)>,
    fetched: Vec<ReportId>,
    updated: Vec<(ReportId, Report)>,
    published: Vec<Report>,
    create_failures: VecDeque<Scripted>,
    fetch_failures: VecDeque<Scripted>,
    update_failures: VecDeque<Scripted>,
}

/// Publish channel that keeps every call in memory
pub struct RecordingChannel {
    state: Mutex<ChannelState>,
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState {
                next_id: 1000,
                ..Default::default()
            }),
        }
    }

    /// Pretend `id` was published earlier
    pub fn with_existing(self, id: ReportId) -> Self {
        self.state.lock().unwrap().existing.insert(id);
        self
    }

    /// Delete a report out-of-band
    pub fn delete(&self, id: ReportId) {
        self.state.lock().unwrap().existing.remove(&id);
    }

    pub fn fail_next_create(&self, failure: Scripted) {
        self.state.lock().unwrap().create_failures.push_back(failure);
    }

    pub fn fail_next_fetch(&self, failure: Scripted) {
        self.state.lock().unwrap().fetch_failures.push_back(failure);
    }

    pub fn fail_next_update(&self, failure: Scripted) {
        self.state.lock().unwrap().update_failures.push_back(failure);
    }

    pub fn created(&self) -> Vec<(ReportId, Report)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn updated(&self) -> Vec<(ReportId, Report)> {
        self.state.lock().unwrap().updated.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetched.len()
    }

    /// Report of the last create or update call
    pub fn last_report(&self) -> Option<Report> {
        self.state.lock().unwrap().published.last().cloned()
    }
}

#[async_trait]
impl PublishChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn create(&self, report: &Report) -> ChannelResult<ReportId> {
        let mut state = self.state.lock().unwrap();
        if let Some(failure) = state.create_failures.pop_front() {
            return Err(failure.into_error());
        }

        state.next_id += 1;
        let id = ReportId(state.next_id);
        state.existing.insert(id);
        state.created.push((id, report.clone()));
        state.published.push(report.clone());
        Ok(id)
    }

    async fn fetch(&self, id: ReportId) -> ChannelResult<ReportHandle> {
        let mut state = self.state.lock().unwrap();
        state.fetched.push(id);
        if let Some(failure) = state.fetch_failures.pop_front() {
            return Err(failure.into_error());
        }

        if state.existing.contains(&id) {
            Ok(ReportHandle { id })
        } else {
            Err(ChannelError::NotFound)
        }
    }

    async fn update(&self, handle: &ReportHandle, report: &Report) -> ChannelResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(failure) = state.update_failures.pop_front() {
            return Err(failure.into_error());
        }

        state.updated.push((handle.id, report.clone()));
        state.published.push(report.clone());
        Ok(())
    }
}

/// Engine over fakes, with maps and bindings under `dir`
pub fn engine(
    dir: &Path,
    prober: Arc<FakeProber>,
    fetcher: FakeFetcher,
    channel: Arc<RecordingChannel>,
) -> SyncEngine {
    let maps = dir.join("maps");
    std::fs::create_dir_all(&maps).unwrap();

    let sources = SnapshotSources {
        prober,
        fetcher: Arc::new(fetcher),
        geo: Arc::new(FakeGeo::us()),
        assets: Arc::new(FsAssetResolver::new(maps)),
    };

    SyncEngine::new(
        sources,
        channel,
        ReportBuilder::new(Locale::En),
        dir.join("embeds.txt"),
    )
}

/// Bindings file content under `dir`
pub fn bindings_file(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("embeds.txt")).unwrap_or_default()
}
