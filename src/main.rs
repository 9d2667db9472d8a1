use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use podcast_playlist_sync::config::{AppConfig, CliConfig, FileConfig};
use podcast_playlist_sync::episode::RssFeedSource;
use podcast_playlist_sync::extraction::extract;
use podcast_playlist_sync::provider::SpotifyClient;
use podcast_playlist_sync::reconcile::PlaylistReconciler;
use podcast_playlist_sync::resolver::CatalogResolver;
use podcast_playlist_sync::sync::{BatchSummary, PodcastSyncer};

#[derive(Parser, Debug)]
#[clap(version, about = "Keeps a streaming playlist per podcast in sync with its track listings")]
struct CliArgs {
    /// Path to a TOML config file. Its values override CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    #[clap(long, env = "SPOTIFY_CLIENT_ID")]
    pub client_id: Option<String>,

    #[clap(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    #[clap(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    #[clap(long, env = "SPOTIFY_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Base URL of the Web API.
    #[clap(long)]
    pub api_base_url: Option<String>,

    /// Base URL of the accounts service (token refresh).
    #[clap(long)]
    pub accounts_base_url: Option<String>,

    /// Timeout in seconds for every HTTP request.
    #[clap(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Maximum number of catalog searches in flight.
    #[clap(long, default_value_t = 5)]
    pub concurrency: usize,

    /// Hours between two runs in daemon mode.
    #[clap(long, default_value_t = 24)]
    pub interval_hours: u64,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync every configured podcast once and print a JSON summary.
    Sync {
        /// Only sync the podcast with this id.
        #[clap(long)]
        podcast: Option<String>,
    },
    /// Sync immediately, then again every `interval_hours`, until Ctrl-C.
    Daemon,
    /// Print the latest episode of each podcast with its tracks. No provider calls.
    Preview {
        #[clap(long)]
        podcast: Option<String>,
    },
    /// Extract tracks from a description read from a file, or stdin.
    Extract { file: Option<PathBuf> },
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            api_base_url: self.api_base_url.clone(),
            accounts_base_url: self.accounts_base_url.clone(),
            timeout_secs: self.timeout_secs,
            concurrency: self.concurrency,
            interval_hours: self.interval_hours,
        }
    }
}

fn build_syncer(config: &AppConfig) -> Result<PodcastSyncer> {
    let provider = Arc::new(
        SpotifyClient::new(config.provider.clone()).context("Failed to create provider client")?,
    );
    let feeds = Arc::new(
        RssFeedSource::new(config.provider.timeout_secs).context("Failed to create feed client")?,
    );
    let resolver = CatalogResolver::new(provider.clone(), &config.resolver);
    let reconciler = PlaylistReconciler::new(provider.clone(), config.reconcile.clone());
    Ok(PodcastSyncer::new(
        provider,
        feeds,
        resolver,
        reconciler,
        &config.sync,
    ))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn log_summary(summary: &BatchSummary) {
    if summary.success {
        info!(
            "Sync completed: {} podcasts in {}ms",
            summary.success_count, summary.total_duration_ms
        );
    } else {
        warn!(
            "Sync completed with failures: {} succeeded, {} failed",
            summary.success_count, summary.failure_count
        );
    }
}

fn load_config(cli_args: &CliArgs) -> Result<AppConfig> {
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    AppConfig::resolve(&cli_args.to_cli_config(), file_config)
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
        }
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    match &cli_args.command {
        Command::Extract { file } => {
            let raw = read_input(file.as_deref())?;
            print_json(&extract(&raw))?;
        }
        Command::Sync { podcast } => {
            let config = load_config(&cli_args)?;
            let syncer = build_syncer(&config)?;
            let podcasts = config.select_podcasts(podcast.as_deref())?;
            let credentials = config.credentials.credentials()?;

            let summary = syncer.run_batch(&credentials, &podcasts).await;
            log_summary(&summary);
            print_json(&summary)?;
            if !summary.success {
                std::process::exit(1);
            }
        }
        Command::Daemon => {
            let config = load_config(&cli_args)?;
            let syncer = build_syncer(&config)?;
            let mut credentials = config.credentials.credentials()?;
            let interval = Duration::from_secs(config.sync.interval_hours * 60 * 60);
            let mut ticker = tokio::time::interval(interval);
            info!(
                "Daemon started: syncing {} podcasts every {} hours",
                config.podcasts.len(),
                config.sync.interval_hours
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let summary = syncer.run_batch(&credentials, &config.podcasts).await;
                        log_summary(&summary);
                        credentials = summary.credentials;
                    }
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!("Failed to listen for shutdown signal: {}", e);
                        }
                        info!("Shutdown signal received, stopping daemon");
                        break;
                    }
                }
            }
        }
        Command::Preview { podcast } => {
            let config = load_config(&cli_args)?;
            let syncer = build_syncer(&config)?;
            let podcasts = config.select_podcasts(podcast.as_deref())?;
            print_json(&syncer.preview(&podcasts).await)?;
        }
    }

    Ok(())
}
