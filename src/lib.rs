//! serverwatch - Game server status monitor
//!
//! Probes a list of game servers on a fixed period and keeps one Discord
//! status embed per server in sync with what it observes.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`probe`] - TCP liveness probing
//! - [`query`] - Source Engine (A2S) metadata queries
//! - [`geo`] - Region lookup for server addresses
//! - [`report`] - Rendering snapshots into status reports
//! - [`channel`] - Publish channels (Discord REST)
//! - [`storage`] - Durable endpoint → report bindings
//! - [`sync`] - Per-cycle synchronization and the periodic driver
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use serverwatch::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Path::new("serverwatch.toml"))?;
//!     config.validate()?;
//!
//!     let sources = SnapshotSources {
//!         prober: Arc::new(TcpProber::new()),
//!         fetcher: Arc::new(A2sClient::new(config.query_timeout())),
//!         geo: Arc::new(IpInfoResolver::new(
//!             config.geo.token.clone(),
//!             config.geo_timeout(),
//!             config.monitor.language,
//!         )?),
//!         assets: Arc::new(FsAssetResolver::new(&config.monitor.maps_path)),
//!     };
//!     let channel = Arc::new(DiscordChannel::new(config.discord.clone())?);
//!     let engine = SyncEngine::new(
//!         sources,
//!         channel,
//!         ReportBuilder::new(config.monitor.language),
//!         &config.monitor.bindings_path,
//!     );
//!
//!     let report = engine.run_cycle(&config.servers).await;
//!     println!("{} endpoints synced", report.outcomes.len());
//!     Ok(())
//! }
//! ```

// Initialize rust-i18n at crate root level
rust_i18n::i18n!("locales", fallback = "en");

pub mod channel;
pub mod config;
pub mod error;
pub mod geo;
pub mod i18n;
pub mod metrics;
pub mod models;
pub mod probe;
pub mod query;
pub mod report;
pub mod storage;
pub mod sync;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::channel::{ChannelError, DiscordChannel, DiscordConfig, PublishChannel};
    pub use crate::config::Config;
    pub use crate::error::{ErrorCategory, WatchErrorTrait};
    pub use crate::geo::{GeoResolver, IpInfoResolver};
    pub use crate::i18n::Locale;
    pub use crate::models::{Endpoint, RegionLabel, ReportId, ServerMetadata, StatusSnapshot};
    pub use crate::probe::{Prober, TcpProber};
    pub use crate::query::{A2sClient, MetadataFetcher};
    pub use crate::report::{AssetResolver, FsAssetResolver, Report, ReportBuilder};
    pub use crate::storage::BindingStore;
    pub use crate::sync::{CycleReport, Monitor, PublishOutcome, SnapshotSources, SyncEngine};
}

// Direct re-exports for convenience
pub use models::{Endpoint, ReportId, StatusSnapshot};
