use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use serverwatch::channel::DiscordChannel;
use serverwatch::config::Config;
use serverwatch::geo::IpInfoResolver;
use serverwatch::metrics;
use serverwatch::models::Endpoint;
use serverwatch::probe::TcpProber;
use serverwatch::query::A2sClient;
use serverwatch::report::{FsAssetResolver, ReportBuilder};
use serverwatch::storage::BindingStore;
use serverwatch::sync::{EngineSettings, Monitor, PublishOutcome, SnapshotSources, SyncEngine};

#[derive(Parser)]
#[command(
    name = "serverwatch",
    version,
    about = "Keeps Discord status embeds of game servers up to date",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "serverwatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync all servers periodically until Ctrl-C
    Run,

    /// Run a single sync cycle
    Once {
        /// Print Prometheus metrics after the cycle
        #[arg(long, default_value = "false")]
        metrics: bool,
    },

    /// Show the current status of a configured server
    Status {
        /// Server IP or host name
        ip: String,

        /// Server port
        port: u16,

        /// Also post the report as a new, unbound message
        #[arg(long, default_value = "false")]
        publish: bool,
    },

    /// Add a server to the configuration file
    Add {
        /// Unique display name
        name: String,

        /// Server IP or host name
        ip: String,

        /// Server port
        port: u16,

        /// Connect hint shown in the report (e.g. steam://connect/...)
        connect_link: String,
    },

    /// List persisted report bindings
    Bindings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = Config::from_file(&cli.config)?;
    let config = file_config.clone().with_env_overrides();

    // Initialize tracing/logging
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Run => {
            tracing::info!(config = %cli.config.display(), "Starting run command");
            run(&config, &cli.config).await?;
        }

        Commands::Once { metrics } => {
            tracing::info!(metrics = %metrics, "Starting once command");
            once(&config, metrics).await?;
        }

        Commands::Status { ip, port, publish } => {
            tracing::info!(ip = %ip, port = %port, publish = %publish, "Starting status command");
            status(&config, &ip, port, publish).await?;
        }

        Commands::Add {
            name,
            ip,
            port,
            connect_link,
        } => {
            tracing::info!(name = %name, ip = %ip, port = %port, "Starting add command");
            add(&file_config, &cli.config, Endpoint::new(name, ip, port, connect_link))?;
        }

        Commands::Bindings => {
            bindings(&config)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("serverwatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("serverwatch={level},warn"))
            .context("Invalid logging.level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn build_engine(config: &Config) -> Result<SyncEngine> {
    let geo = IpInfoResolver::with_base_url(
        &config.geo.base_url,
        config.geo.token.clone(),
        config.geo_timeout(),
        config.monitor.language,
    )
    .context("Failed to create region resolver")?;

    let sources = SnapshotSources {
        prober: Arc::new(TcpProber::new()),
        fetcher: Arc::new(A2sClient::new(config.query_timeout())),
        geo: Arc::new(geo),
        assets: Arc::new(FsAssetResolver::new(&config.monitor.maps_path)),
    };

    let channel =
        DiscordChannel::new(config.discord.clone()).context("Failed to create Discord channel")?;

    Ok(SyncEngine::new(
        sources,
        Arc::new(channel),
        ReportBuilder::new(config.monitor.language),
        &config.monitor.bindings_path,
    )
    .with_settings(EngineSettings::from_config(config)))
}

fn init_metrics() {
    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed, continuing without metrics");
    }
}

async fn run(config: &Config, config_path: &Path) -> Result<()> {
    let engine = build_engine(config)?;
    let mut monitor = Monitor::new(engine, config.servers.clone(), config.interval())
        .with_config_reload(config_path);

    if let Some(path) = &config.monitor.metrics_file {
        init_metrics();
        tracing::info!(path = %path.display(), "Exporting metrics after every cycle");
        monitor = monitor.with_metrics_file(path);
    }

    let cycles = monitor.run().await;
    println!("Stopped after {cycles} cycles");
    Ok(())
}

async fn once(config: &Config, print_metrics: bool) -> Result<()> {
    init_metrics();

    let engine = build_engine(config)?;
    let report = engine.run_cycle(&config.servers).await;

    if let Some(reason) = &report.skipped {
        anyhow::bail!("Cycle skipped: {reason}");
    }

    for entry in &report.outcomes {
        let state = if entry.reachable { "online" } else { "offline" };
        let detail = match &entry.outcome {
            PublishOutcome::Created { id, .. } => format!("created {id}"),
            PublishOutcome::Updated { .. } => "updated".to_string(),
            PublishOutcome::Stale { id } => format!("report {id} gone, will recreate"),
            PublishOutcome::Deferred => "not published until first seen online".to_string(),
            PublishOutcome::Orphaned { id, message } => {
                format!("created {id}, not saved: {message}")
            }
            PublishOutcome::Failed { message, .. } => format!("failed: {message}"),
        };
        println!("{:<24} {:<8} {}", entry.endpoint, state, detail);
    }

    if print_metrics {
        let text = metrics::encode_metrics().map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("{text}");
    }

    Ok(())
}

async fn status(config: &Config, ip: &str, port: u16, publish: bool) -> Result<()> {
    let endpoint = config
        .find_endpoint(ip, port)
        .with_context(|| format!("Server {ip}:{port} not found"))?;

    let engine = build_engine(config)?;

    if publish {
        let id = engine
            .publish_ephemeral(endpoint)
            .await
            .context("Failed to publish status report")?;
        println!("Published report {id}");
    } else {
        let report = engine.status_report(endpoint).await;
        println!("{report}");
    }

    Ok(())
}

fn add(file_config: &Config, config_path: &Path, endpoint: Endpoint) -> Result<()> {
    let name = endpoint.name.clone();
    let updated = file_config.with_endpoint(endpoint)?;
    updated.save(config_path)?;

    println!("Server {name} added");
    Ok(())
}

fn bindings(config: &Config) -> Result<()> {
    let store = BindingStore::load(&config.monitor.bindings_path)?;

    if store.is_empty() {
        println!("No bindings in {}", store.path().display());
        return Ok(());
    }

    for (identity, id) in store.iter() {
        let known = config.servers.iter().any(|s| s.identity() == identity);
        let marker = if known { "" } else { "  (not configured)" };
        println!("{identity}:{id}{marker}");
    }

    if !store.warnings().is_empty() {
        println!("{} problem line(s) ignored", store.warnings().len());
    }

    Ok(())
}
