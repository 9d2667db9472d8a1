use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::reconcile::ReconcilePolicy;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Provider credentials (can override CLI / env)
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,

    pub podcasts: Option<Vec<PodcastConfig>>,

    // Feature configs
    pub provider: Option<ProviderConfig>,
    pub resolver: Option<ResolverConfig>,
    pub reconcile: Option<ReconcileConfig>,
    pub sync: Option<SyncConfig>,
}

/// One `[[podcasts]]` entry.
#[derive(Debug, Deserialize, Clone)]
pub struct PodcastConfig {
    pub id: String,
    pub name: String,
    pub rss: String,
    #[serde(default)]
    pub require_listing_anchor: bool,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_base_url: Option<String>,
    pub accounts_base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ResolverConfig {
    pub concurrency: Option<usize>,
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub max_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Membership policy: "additive" or "capped"
    pub policy: Option<ReconcilePolicy>,
    pub max_tracks: Option<usize>,
    pub removal_chunk_size: Option<usize>,
    pub page_size: Option<u32>,
    pub description: Option<String>,
    pub public: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_hours: Option<u64>,
    pub episodes_limit: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
