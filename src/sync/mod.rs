//! Per-podcast pipeline: feed, extraction, resolution and reconciliation.
//!
//! Podcasts of a batch run one after another in configured order. A failing
//! podcast is recorded in the summary and the batch moves on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{PodcastConfig, SyncSettings};
use crate::episode::{assemble_episodes, latest_episodes, Episode, FeedError, FeedSource};
use crate::extraction::ExtractOptions;
use crate::provider::{Credentials, ProviderClient, ProviderError};
use crate::reconcile::{PlaylistReconciler, PlaylistTarget, ReconcileError};
use crate::resolver::{resolved_uris, CatalogResolver};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to refresh access token: {0}")]
    Refresh(#[source] ProviderError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("Failed to reconcile playlist '{playlist}': {source}")]
    Reconcile {
        playlist: String,
        source: ReconcileError,
    },
}

/// What happened to one episode of a podcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EpisodeReport {
    pub title: String,
    pub extracted: usize,
    pub resolved: usize,
    pub added: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodcastSyncReport {
    pub podcast: String,
    pub playlist: String,
    /// Oldest first, in processing order.
    pub episodes: Vec<EpisodeReport>,
    pub duration_ms: u64,
}

impl PodcastSyncReport {
    pub fn added(&self) -> usize {
        self.episodes.iter().map(|e| e.added).sum()
    }

    pub fn removed(&self) -> usize {
        self.episodes.iter().map(|e| e.removed).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PodcastResult {
    Success(PodcastSyncReport),
    Failure { podcast: String, error: String },
}

impl PodcastResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PodcastResult::Success(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub success: bool,
    pub total_podcasts: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_duration_ms: u64,
    pub results: Vec<PodcastResult>,
    /// Latest credentials seen during the batch, possibly with a rotated
    /// refresh token.
    #[serde(skip)]
    pub credentials: Credentials,
}

/// Latest episode of a podcast as seen by [`PodcastSyncer::preview`].
#[derive(Debug, Clone, Serialize)]
pub struct PodcastPreview {
    pub podcast: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<Episode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct PodcastSyncer {
    provider: Arc<dyn ProviderClient>,
    feeds: Arc<dyn FeedSource>,
    resolver: CatalogResolver,
    reconciler: PlaylistReconciler,
    episodes_limit: usize,
}

impl PodcastSyncer {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        feeds: Arc<dyn FeedSource>,
        resolver: CatalogResolver,
        reconciler: PlaylistReconciler,
        settings: &SyncSettings,
    ) -> Self {
        Self {
            provider,
            feeds,
            resolver,
            reconciler,
            episodes_limit: settings.episodes_limit,
        }
    }

    /// Refreshes the credentials, then brings the podcast's playlist up to
    /// date with its latest episodes.
    pub async fn sync_podcast(
        &self,
        credentials: &Credentials,
        podcast: &PodcastConfig,
    ) -> Result<PodcastSyncReport, SyncError> {
        let started = Instant::now();
        let refreshed = self.refresh(credentials).await?;
        self.sync_refreshed(&refreshed, podcast, started).await
    }

    /// Syncs every podcast in order. Never stops on a failure.
    pub async fn run_batch(
        &self,
        credentials: &Credentials,
        podcasts: &[PodcastConfig],
    ) -> BatchSummary {
        let started = Instant::now();
        let mut current = credentials.clone();
        let mut results = Vec::with_capacity(podcasts.len());

        for podcast in podcasts {
            info!(podcast = %podcast.id, "Starting podcast processing");
            let podcast_started = Instant::now();

            let outcome = match self.refresh(&current).await {
                Ok(refreshed) => {
                    current = refreshed;
                    self.sync_refreshed(&current, podcast, podcast_started)
                        .await
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(report) => {
                    info!(
                        podcast = %podcast.id,
                        added = report.added(),
                        removed = report.removed(),
                        duration_ms = report.duration_ms,
                        "Podcast processing completed"
                    );
                    results.push(PodcastResult::Success(report));
                }
                Err(e) => {
                    error!(podcast = %podcast.id, error = %e, "Podcast processing failed");
                    results.push(PodcastResult::Failure {
                        podcast: podcast.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let success_count = results.iter().filter(|r| r.is_success()).count();
        let failure_count = results.len() - success_count;
        let total_duration_ms = elapsed_ms(started.elapsed());

        info!(
            "All podcasts processed: {} succeeded, {} failed in {}ms",
            success_count, failure_count, total_duration_ms
        );

        BatchSummary {
            success: failure_count == 0,
            total_podcasts: podcasts.len(),
            success_count,
            failure_count,
            total_duration_ms,
            results,
            credentials: current,
        }
    }

    /// Fetches every feed concurrently and reports its latest episode.
    /// No provider call is made.
    pub async fn preview(&self, podcasts: &[PodcastConfig]) -> Vec<PodcastPreview> {
        join_all(podcasts.iter().map(|podcast| async move {
            match self.latest_episodes(podcast).await {
                Ok(mut episodes) => PodcastPreview {
                    podcast: podcast.id.clone(),
                    name: podcast.name.clone(),
                    // newest is last
                    episode: episodes.pop(),
                    error: None,
                },
                Err(e) => {
                    warn!(podcast = %podcast.id, error = %e, "Preview failed");
                    PodcastPreview {
                        podcast: podcast.id.clone(),
                        name: podcast.name.clone(),
                        episode: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        }))
        .await
    }

    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials, SyncError> {
        let refreshed = self
            .provider
            .refresh_access_token(credentials)
            .await
            .map_err(SyncError::Refresh)?;
        info!("Successfully refreshed access token");
        Ok(refreshed)
    }

    async fn sync_refreshed(
        &self,
        credentials: &Credentials,
        podcast: &PodcastConfig,
        started: Instant,
    ) -> Result<PodcastSyncReport, SyncError> {
        let episodes = self.latest_episodes(podcast).await?;
        if episodes.is_empty() {
            warn!(podcast = %podcast.id, rss = %podcast.rss, "No episodes found in feed");
        }

        let mut target = PlaylistTarget::named(podcast.name.clone());
        let mut reports = Vec::with_capacity(episodes.len());

        for episode in &episodes {
            let mut report = EpisodeReport {
                title: episode.title.clone(),
                extracted: episode.playlist.len(),
                ..Default::default()
            };

            if episode.playlist.is_empty() {
                warn!(podcast = %podcast.id, episode = %episode.title, "No tracks found in episode");
                reports.push(report);
                continue;
            }

            info!(
                podcast = %podcast.id,
                episode = %episode.title,
                tracks = episode.playlist.len(),
                "Processing episode"
            );

            let resolved = self
                .resolver
                .resolve_many(credentials, &episode.playlist)
                .await;
            let uris = resolved_uris(&resolved);
            report.resolved = resolved.iter().filter(|t| t.catalog_match.is_some()).count();

            let outcome = self
                .reconciler
                .reconcile(credentials, &mut target, &uris)
                .await
                .map_err(|source| SyncError::Reconcile {
                    playlist: podcast.name.clone(),
                    source,
                })?;
            report.added = outcome.added;
            report.removed = outcome.removed;
            reports.push(report);
        }

        Ok(PodcastSyncReport {
            podcast: podcast.id.clone(),
            playlist: podcast.name.clone(),
            episodes: reports,
            duration_ms: elapsed_ms(started.elapsed()),
        })
    }

    /// Up to `episodes_limit` most recent episodes, oldest first.
    async fn latest_episodes(&self, podcast: &PodcastConfig) -> Result<Vec<Episode>, FeedError> {
        let items = self.feeds.fetch_items(&podcast.rss).await?;
        info!(podcast = %podcast.id, items = items.len(), "Fetched feed");

        let options = ExtractOptions {
            require_listing_anchor: podcast.require_listing_anchor,
        };
        let episodes = assemble_episodes(items, options);
        let mut latest: Vec<Episode> = latest_episodes(&episodes, self.episodes_limit)
            .into_iter()
            .cloned()
            .collect();
        latest.reverse();
        Ok(latest)
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    elapsed.as_millis() as u64
}
