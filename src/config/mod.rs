//! Configuration management for serverwatch
//!
//! This module handles loading, validating and saving the TOML configuration
//! file, with secrets optionally supplied through environment variables.
//!
//! A [`Config`] is an immutable snapshot: adding a server produces a new
//! value through [`Config::with_endpoint`], which can then be saved.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::channel::DiscordConfig;
use crate::geo::DEFAULT_GEO_BASE_URL;
use crate::i18n::Locale;
use crate::models::Endpoint;

/// Environment variable overriding `discord.token`
pub const ENV_DISCORD_TOKEN: &str = "SERVERWATCH_DISCORD_TOKEN";
/// Environment variable overriding `geo.token`
pub const ENV_IPINFO_TOKEN: &str = "SERVERWATCH_IPINFO_TOKEN";
/// Environment variable overriding `logging.level`
pub const ENV_LOG_LEVEL: &str = "SERVERWATCH_LOG_LEVEL";
/// Environment variable overriding `logging.format`
pub const ENV_LOG_FORMAT: &str = "SERVERWATCH_LOG_FORMAT";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Discord channel configuration
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Region lookup configuration
    #[serde(default)]
    pub geo: GeoConfig,

    /// Cycle and engine configuration
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Monitored servers, in publishing order
    #[serde(default)]
    pub servers: Vec<Endpoint>,
}

/// Region lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// ipinfo.io access token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Lookup service root
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_GEO_BASE_URL.to_string(),
            timeout_secs: 5,
        }
    }
}

/// Cycle and engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between cycle starts
    pub interval_secs: u64,

    /// Liveness probe timeout in seconds
    pub probe_timeout_secs: u64,

    /// A2S exchange timeout in seconds
    pub query_timeout_secs: u64,

    /// Rate-limit wait when the channel gives no advice
    pub default_retry_after_ms: u64,

    /// Endpoints snapshotted in parallel
    pub max_concurrent_probes: usize,

    /// Directory holding `<map>.png` images and `unknown.png`
    pub maps_path: PathBuf,

    /// Bindings file
    pub bindings_path: PathBuf,

    /// Report language
    pub language: Locale,

    /// Prometheus text file rewritten after every cycle of the daemon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_file: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            probe_timeout_secs: 3,
            query_timeout_secs: 3,
            default_retry_after_ms: 1000,
            max_concurrent_probes: 4,
            maps_path: PathBuf::from("maps"),
            bindings_path: PathBuf::from("embeds.txt"),
            language: Locale::default(),
            metrics_file: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Default configuration with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a file, exactly as written
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load a file and apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_file(path)?.with_env_overrides())
    }

    /// Replace secrets and logging settings with values from the environment
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(token) = env_non_empty(ENV_DISCORD_TOKEN) {
            self.discord.token = token;
        }

        if let Some(token) = env_non_empty(ENV_IPINFO_TOKEN) {
            self.geo.token = Some(token);
        }

        if let Some(level) = env_non_empty(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }

        if let Some(format) = env_non_empty(ENV_LOG_FORMAT) {
            self.logging.format = format;
        }

        self
    }

    /// Validate configuration values
    ///
    /// Discord credentials are checked when the channel is built, so that
    /// commands that never publish work without them.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.interval_secs == 0 {
            anyhow::bail!("monitor.interval_secs must be greater than 0");
        }

        if self.monitor.probe_timeout_secs == 0 || self.monitor.query_timeout_secs == 0 {
            anyhow::bail!("monitor timeouts must be greater than 0");
        }

        if self.monitor.max_concurrent_probes == 0 {
            anyhow::bail!("monitor.max_concurrent_probes must be greater than 0");
        }

        if self.geo.timeout_secs == 0 {
            anyhow::bail!("geo.timeout_secs must be greater than 0");
        }

        url::Url::parse(&self.geo.base_url)
            .with_context(|| format!("Invalid geo.base_url: {}", self.geo.base_url))?;

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json'");
        }

        let mut names = HashSet::new();
        for endpoint in &self.servers {
            validate_endpoint(endpoint)?;
            if !names.insert(endpoint.name.as_str()) {
                anyhow::bail!("Duplicate server name: {}", endpoint.name);
            }
        }

        Ok(())
    }

    /// New configuration with `endpoint` appended
    pub fn with_endpoint(&self, endpoint: Endpoint) -> Result<Self> {
        validate_endpoint(&endpoint)?;

        if self.servers.iter().any(|s| s.name == endpoint.name) {
            anyhow::bail!("Server '{}' already exists", endpoint.name);
        }

        let mut config = self.clone();
        config.servers.push(endpoint);
        Ok(config)
    }

    /// Configured endpoint answering to `ip:port`
    pub fn find_endpoint(&self, ip: &str, port: u16) -> Option<&Endpoint> {
        self.servers.iter().find(|s| s.matches_address(ip, port))
    }

    /// Write the configuration to `path` (temp file, then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        std::fs::write(&temp_path, content)
            .with_context(|| format!("Failed to write config file: {}", temp_path.display()))?;
        std::fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to replace config file: {}", path.display()))?;

        Ok(())
    }

    /// Get cycle period as Duration
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.monitor.interval_secs)
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor.probe_timeout_secs)
    }

    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor.query_timeout_secs)
    }

    #[must_use]
    pub fn default_retry_after(&self) -> Duration {
        Duration::from_millis(self.monitor.default_retry_after_ms)
    }

    #[must_use]
    pub fn geo_timeout(&self) -> Duration {
        Duration::from_secs(self.geo.timeout_secs)
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Names must round-trip through the bindings file
fn validate_endpoint(endpoint: &Endpoint) -> Result<()> {
    let name = endpoint.name.as_str();

    if name.trim().is_empty() {
        anyhow::bail!("Server name cannot be empty");
    }

    if name.trim() != name || name.contains(['\n', '\r']) {
        anyhow::bail!(
            "Server name '{}' has surrounding whitespace or line breaks",
            name.escape_debug()
        );
    }

    if endpoint.ip.trim().is_empty() {
        anyhow::bail!("Server '{name}' has no ip");
    }

    if endpoint.port == 0 {
        anyhow::bail!("Server '{name}' has port 0");
    }

    Ok(())
}
