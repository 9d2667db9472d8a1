//! Catalog resolution: maps extracted track descriptors to provider tracks.
//!
//! Searches run through a small pool of logical workers so that no more than
//! `concurrency` requests are in flight at once. Each search is retried with
//! exponential backoff; a track that still fails is logged and left unresolved.

pub mod retry_policy;

pub use retry_policy::{RetryPolicy, Retryable, Sleeper, TokioSleeper};

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ResolverSettings;
use crate::extraction::TrackDescriptor;
use crate::provider::{CatalogMatch, Credentials, ProviderClient, ProviderError};

/// A descriptor paired with its catalog match, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTrack {
    pub descriptor: TrackDescriptor,
    pub catalog_match: Option<CatalogMatch>,
}

impl ResolvedTrack {
    pub fn uri(&self) -> Option<&str> {
        self.catalog_match.as_ref().map(|m| m.uri.as_str())
    }
}

/// URIs of the resolved tracks, in order, without unresolved entries or duplicates.
pub fn resolved_uris(tracks: &[ResolvedTrack]) -> Vec<String> {
    let mut seen = HashSet::new();
    tracks
        .iter()
        .filter_map(ResolvedTrack::uri)
        .filter(|uri| seen.insert(*uri))
        .map(str::to_string)
        .collect()
}

pub struct CatalogResolver {
    provider: Arc<dyn ProviderClient>,
    sleeper: Arc<dyn Sleeper>,
    retry_policy: RetryPolicy,
    concurrency: usize,
}

impl CatalogResolver {
    pub fn new(provider: Arc<dyn ProviderClient>, settings: &ResolverSettings) -> Self {
        Self {
            provider,
            sleeper: Arc::new(TokioSleeper),
            retry_policy: RetryPolicy::new(settings),
            concurrency: settings.concurrency.max(1),
        }
    }

    /// Replace the sleeper used between retries.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Single structured search, no retry. `None` when the catalog has no match.
    pub async fn resolve_one(
        &self,
        credentials: &Credentials,
        descriptor: &TrackDescriptor,
    ) -> Result<Option<CatalogMatch>, ProviderError> {
        let matches = self
            .provider
            .search_tracks(credentials, descriptor, 1)
            .await?;
        Ok(matches.into_iter().next())
    }

    /// Resolves every descriptor, preserving input order.
    ///
    /// The result always has the same length as `descriptors`. Failures are
    /// never returned: a descriptor whose retries are exhausted stays unresolved.
    pub async fn resolve_many(
        &self,
        credentials: &Credentials,
        descriptors: &[TrackDescriptor],
    ) -> Vec<ResolvedTrack> {
        if descriptors.is_empty() {
            return Vec::new();
        }

        let next = &AtomicUsize::new(0);
        let workers = self.concurrency.min(descriptors.len());
        debug!(
            "Resolving {} tracks with {} workers",
            descriptors.len(),
            workers
        );

        let worker_results = join_all((0..workers).map(|_| async move {
            let mut done = Vec::new();
            loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(descriptor) = descriptors.get(index) else {
                    break;
                };
                done.push((index, self.resolve_with_retry(credentials, descriptor).await));
            }
            done
        }))
        .await;

        let mut slots: Vec<Option<CatalogMatch>> = vec![None; descriptors.len()];
        for (index, catalog_match) in worker_results.into_iter().flatten() {
            slots[index] = catalog_match;
        }

        let resolved: Vec<ResolvedTrack> = descriptors
            .iter()
            .cloned()
            .zip(slots)
            .map(|(descriptor, catalog_match)| ResolvedTrack {
                descriptor,
                catalog_match,
            })
            .collect();

        info!(
            "Resolved {}/{} tracks",
            resolved.iter().filter(|t| t.catalog_match.is_some()).count(),
            resolved.len()
        );
        resolved
    }

    async fn resolve_with_retry(
        &self,
        credentials: &Credentials,
        descriptor: &TrackDescriptor,
    ) -> Option<CatalogMatch> {
        let outcome = self
            .retry_policy
            .run(self.sleeper.as_ref(), |_| {
                self.resolve_one(credentials, descriptor)
            })
            .await;

        match outcome {
            Ok(Some(catalog_match)) => {
                debug!("{} -> {}", descriptor, catalog_match.uri);
                Some(catalog_match)
            }
            Ok(None) => {
                debug!("No catalog match for {}", descriptor);
                None
            }
            Err(e) => {
                warn!("Giving up on {}: {}", descriptor, e);
                None
            }
        }
    }
}
