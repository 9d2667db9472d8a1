mod file_config;

pub use file_config::{
    FileConfig, PodcastConfig, ProviderConfig, ReconcileConfig, ResolverConfig, SyncConfig,
};

use anyhow::{anyhow, bail, Result};
use std::collections::HashSet;

use crate::provider::spotify::{DEFAULT_ACCOUNTS_BASE_URL, DEFAULT_API_BASE_URL};
use crate::provider::{Credentials, SpotifyClientConfig};
use crate::reconcile::ReconcilePolicy;

/// Largest page the provider accepts when listing the user's playlists.
const MAX_PAGE_SIZE: u32 = 50;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub api_base_url: Option<String>,
    pub accounts_base_url: Option<String>,
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub interval_hours: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: CredentialSettings,
    pub podcasts: Vec<PodcastConfig>,

    // Feature configs (with defaults)
    pub provider: SpotifyClientConfig,
    pub resolver: ResolverSettings,
    pub reconcile: ReconcileSettings,
    pub sync: SyncSettings,
}

/// Credential values as configured. Only commands that talk to the provider
/// need them, so they are checked by [`CredentialSettings::credentials`].
#[derive(Clone, Default)]
pub struct CredentialSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CredentialSettings {
    pub fn credentials(&self) -> Result<Credentials> {
        let client_id = self
            .client_id
            .clone()
            .ok_or_else(|| anyhow!("client_id must be specified via --client-id or SPOTIFY_CLIENT_ID"))?;
        let client_secret = self.client_secret.clone().ok_or_else(|| {
            anyhow!("client_secret must be specified via --client-secret or SPOTIFY_CLIENT_SECRET")
        })?;
        let refresh_token = self.refresh_token.clone().ok_or_else(|| {
            anyhow!("refresh_token must be specified via --refresh-token or SPOTIFY_REFRESH_TOKEN")
        })?;

        Ok(Credentials {
            client_id,
            client_secret,
            // Refreshed before use, so an empty one is fine.
            access_token: self.access_token.clone().unwrap_or_default(),
            refresh_token,
        })
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let credentials = CredentialSettings {
            client_id: file.client_id.or_else(|| cli.client_id.clone()),
            client_secret: file.client_secret.or_else(|| cli.client_secret.clone()),
            access_token: cli.access_token.clone(),
            refresh_token: file.refresh_token.or_else(|| cli.refresh_token.clone()),
        };

        let podcasts = file.podcasts.unwrap_or_else(default_podcasts);
        if podcasts.is_empty() {
            bail!("At least one podcast must be configured");
        }
        let mut ids = HashSet::new();
        for podcast in &podcasts {
            if !ids.insert(podcast.id.as_str()) {
                bail!("Duplicated podcast id: {}", podcast.id);
            }
        }

        let provider_file = file.provider.unwrap_or_default();
        let provider = SpotifyClientConfig {
            api_base_url: provider_file
                .api_base_url
                .or_else(|| cli.api_base_url.clone())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            accounts_base_url: provider_file
                .accounts_base_url
                .or_else(|| cli.accounts_base_url.clone())
                .unwrap_or_else(|| DEFAULT_ACCOUNTS_BASE_URL.to_string()),
            timeout_secs: provider_file.timeout_secs.unwrap_or(cli.timeout_secs),
        };

        let resolver_file = file.resolver.unwrap_or_default();
        let resolver = ResolverSettings {
            concurrency: resolver_file.concurrency.unwrap_or(cli.concurrency),
            max_attempts: resolver_file.max_attempts.unwrap_or(4),
            initial_backoff_ms: resolver_file.initial_backoff_ms.unwrap_or(1000),
            backoff_multiplier: resolver_file.backoff_multiplier.unwrap_or(2.0),
            max_backoff_ms: resolver_file.max_backoff_ms.unwrap_or(30_000),
        };
        if resolver.concurrency == 0 {
            bail!("resolver.concurrency must be at least 1");
        }
        if resolver.max_attempts == 0 {
            bail!("resolver.max_attempts must be at least 1");
        }

        let reconcile_file = file.reconcile.unwrap_or_default();
        let defaults = ReconcileSettings::default();
        let reconcile = ReconcileSettings {
            policy: reconcile_file.policy.unwrap_or(defaults.policy),
            max_tracks: reconcile_file.max_tracks.unwrap_or(defaults.max_tracks),
            removal_chunk_size: reconcile_file
                .removal_chunk_size
                .unwrap_or(defaults.removal_chunk_size),
            page_size: reconcile_file.page_size.unwrap_or(defaults.page_size),
            description: reconcile_file.description.unwrap_or(defaults.description),
            public: reconcile_file.public.unwrap_or(defaults.public),
        };
        if reconcile.policy == ReconcilePolicy::Capped && reconcile.max_tracks == 0 {
            bail!("reconcile.max_tracks must be at least 1 with the capped policy");
        }
        if reconcile.page_size == 0 || reconcile.removal_chunk_size == 0 {
            bail!("reconcile.page_size and reconcile.removal_chunk_size must be at least 1");
        }
        if reconcile.page_size > MAX_PAGE_SIZE {
            bail!("reconcile.page_size must be at most {}", MAX_PAGE_SIZE);
        }

        let sync_file = file.sync.unwrap_or_default();
        let sync = SyncSettings {
            interval_hours: sync_file.interval_hours.unwrap_or(cli.interval_hours),
            episodes_limit: sync_file.episodes_limit.unwrap_or(1),
        };
        if sync.interval_hours == 0 {
            bail!("sync.interval_hours must be at least 1");
        }
        if sync.episodes_limit == 0 {
            bail!("sync.episodes_limit must be at least 1");
        }

        Ok(Self {
            credentials,
            podcasts,
            provider,
            resolver,
            reconcile,
            sync,
        })
    }

    /// Podcasts to process: all of them, or only the one with `id`.
    pub fn select_podcasts(&self, id: Option<&str>) -> Result<Vec<PodcastConfig>> {
        match id {
            None => Ok(self.podcasts.clone()),
            Some(id) => self
                .podcasts
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .map(|p| vec![p])
                .ok_or_else(|| anyhow!("Unknown podcast id: {}", id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_attempts: 4,
            initial_backoff_ms: 1000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileSettings {
    pub policy: ReconcilePolicy,
    /// Only used by the capped policy.
    pub max_tracks: usize,
    pub removal_chunk_size: usize,
    pub page_size: u32,
    pub description: String,
    pub public: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            policy: ReconcilePolicy::Additive,
            max_tracks: 200,
            removal_chunk_size: 100,
            page_size: 50,
            description: "Auto-generated playlist from Radio3 podcast".to_string(),
            public: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub interval_hours: u64,
    pub episodes_limit: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            episodes_limit: 1,
        }
    }
}

fn default_podcasts() -> Vec<PodcastConfig> {
    [
        (
            "turbo3",
            "Turbo3",
            "https://www.ivoox.com/turbo-3_fg_f157926_filtro_1.xml",
        ),
        (
            "na-na-na",
            "Na na na",
            "https://www.ivoox.com/na-na-na_fg_f1128042_filtro_1.xml",
        ),
        (
            "180-grados",
            "180 grados",
            "http://api.rtve.es/api/programas/22270/audios.rss",
        ),
    ]
    .into_iter()
    .map(|(id, name, rss)| PodcastConfig {
        id: id.to_string(),
        name: name.to_string(),
        rss: rss.to_string(),
        require_listing_anchor: false,
    })
    .collect()
}
