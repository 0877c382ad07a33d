//! Timing and reload tests for the periodic monitor

mod common;

use async_trait::async_trait;
use common::{alpha, bravo, engine, metadata, FakeFetcher, FakeGeo, FakeProber, RecordingChannel};
use serverwatch::config::Config;
use serverwatch::i18n::Locale;
use serverwatch::models::Endpoint;
use serverwatch::probe::Prober;
use serverwatch::report::{FsAssetResolver, ReportBuilder};
use serverwatch::sync::{Monitor, SnapshotSources, SyncEngine};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Prober that takes `delay` to answer
struct SlowProber {
    delay: Duration,
}

#[async_trait]
impl Prober for SlowProber {
    async fn probe(&self, _endpoint: &Endpoint, _timeout: Duration) -> bool {
        tokio::time::sleep(self.delay).await;
        true
    }
}

fn fetcher() -> FakeFetcher {
    FakeFetcher::new()
        .with("Alpha", metadata("de_dust2", &[]))
        .with("Bravo", metadata("de_inferno", &[]))
}

#[tokio::test(start_paused = true)]
async fn test_cycles_follow_the_interval() {
    let dir = TempDir::new().unwrap();
    let channel = Arc::new(RecordingChannel::new());
    let engine = engine(dir.path(), Arc::new(FakeProber::all_up()), fetcher(), channel.clone());

    let mut monitor = Monitor::new(engine, vec![alpha()], Duration::from_secs(10));
    let cycles = monitor
        .run_until(tokio::time::sleep(Duration::from_secs(25)))
        .await;

    // ticks at 0s, 10s and 20s
    assert_eq!(cycles, 3);
    assert_eq!(channel.created().len(), 1);
    assert_eq!(channel.updated().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_cycles_never_overlap() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("maps")).unwrap();
    let channel = Arc::new(RecordingChannel::new());

    let sources = SnapshotSources {
        prober: Arc::new(SlowProber {
            delay: Duration::from_secs(25),
        }),
        fetcher: Arc::new(fetcher()),
        geo: Arc::new(FakeGeo::us()),
        assets: Arc::new(FsAssetResolver::new(dir.path().join("maps"))),
    };
    let engine = SyncEngine::new(
        sources,
        channel.clone(),
        ReportBuilder::new(Locale::En),
        dir.path().join("embeds.txt"),
    );

    let mut monitor = Monitor::new(engine, vec![alpha()], Duration::from_secs(10));
    let cycles = monitor
        .run_until(tokio::time::sleep(Duration::from_secs(35)))
        .await;

    // 0s..25s, then one late tick starts 25s..50s; shutdown is seen after it
    assert_eq!(cycles, 2);
    assert_eq!(channel.created().len(), 1);
    assert_eq!(channel.updated().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_first_tick() {
    let dir = TempDir::new().unwrap();
    let channel = Arc::new(RecordingChannel::new());
    let engine = engine(dir.path(), Arc::new(FakeProber::all_up()), fetcher(), channel.clone());

    let mut monitor = Monitor::new(engine, vec![alpha()], Duration::from_secs(10));
    let cycles = monitor.run_until(std::future::ready(())).await;

    assert_eq!(cycles, 0);
    assert!(channel.created().is_empty());
}

#[tokio::test]
async fn test_server_list_is_reloaded_between_cycles() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("serverwatch.toml");
    let config = Config::default().with_endpoint(alpha()).unwrap();
    config.save(&config_path).unwrap();

    let channel = Arc::new(RecordingChannel::new());
    let engine = engine(dir.path(), Arc::new(FakeProber::all_up()), fetcher(), channel.clone());
    let mut monitor = Monitor::new(engine, Vec::new(), Duration::from_secs(10))
        .with_config_reload(&config_path);

    let report = monitor.run_once().await;
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(monitor.servers(), &[alpha()]);

    // Another process adds a server
    config.with_endpoint(bravo()).unwrap().save(&config_path).unwrap();
    let report = monitor.run_once().await;
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(channel.created().len(), 2);

    // A broken file keeps the last good list
    std::fs::write(&config_path, "[[servers]\nname = ").unwrap();
    let report = monitor.run_once().await;
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(monitor.servers().len(), 2);
    assert_eq!(channel.created().len(), 2);
}

#[tokio::test]
async fn test_metrics_file_is_written_after_each_cycle() {
    let _ = serverwatch::metrics::init_metrics();
    let dir = TempDir::new().unwrap();
    let metrics_path = dir.path().join("serverwatch.prom");
    let channel = Arc::new(RecordingChannel::new());
    let engine = engine(dir.path(), Arc::new(FakeProber::all_up()), fetcher(), channel);

    let mut monitor = Monitor::new(engine, vec![alpha()], Duration::from_secs(10))
        .with_metrics_file(&metrics_path);
    monitor.run_once().await;

    let text = std::fs::read_to_string(&metrics_path).unwrap();
    assert!(text.contains("serverwatch_cycles_total"));
    assert!(!dir.path().join("serverwatch.prom.tmp").exists());
}
