//! Playlist reconciliation.
//!
//! Converges a named provider playlist towards a set of resolved track URIs
//! with the fewest mutations possible. Two membership policies exist and they
//! are mutually exclusive:
//!
//! - [`ReconcilePolicy::Additive`]: append-only. Tracks already present are
//!   never re-added and nothing is removed, so a second run with the same
//!   input performs no mutation at all.
//! - [`ReconcilePolicy::Capped`]: bounded size. Before appending, the oldest
//!   entries that are not part of the new set are evicted so the playlist
//!   never grows past `max_tracks`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ReconcileSettings;
use crate::provider::{Credentials, NewPlaylist, ProviderClient, ProviderError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcilePolicy {
    #[default]
    Additive,
    Capped,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to fetch current user: {0}")]
    CurrentUser(#[source] ProviderError),

    #[error("Failed to list playlists: {0}")]
    ListPlaylists(#[source] ProviderError),

    #[error("Failed to create playlist '{name}': {source}")]
    CreatePlaylist { name: String, source: ProviderError },

    #[error("Failed to read tracks of playlist {playlist_id}: {source}")]
    ReadTracks {
        playlist_id: String,
        source: ProviderError,
    },

    #[error("Failed to add tracks to playlist {playlist_id}: {source}")]
    AddTracks {
        playlist_id: String,
        source: ProviderError,
    },

    #[error("Failed to remove tracks from playlist {playlist_id}: {source}")]
    RemoveTracks {
        playlist_id: String,
        source: ProviderError,
    },
}

impl ReconcileError {
    /// The provider failure behind this error.
    pub fn provider_error(&self) -> &ProviderError {
        match self {
            ReconcileError::CurrentUser(e) | ReconcileError::ListPlaylists(e) => e,
            ReconcileError::CreatePlaylist { source, .. }
            | ReconcileError::ReadTracks { source, .. }
            | ReconcileError::AddTracks { source, .. }
            | ReconcileError::RemoveTracks { source, .. } => source,
        }
    }
}

/// The playlist a reconciliation converges.
///
/// `existing_provider_id` stays `None` until a playlist with this name has
/// been found or created. `existing_track_uris` is only filled when the
/// playlist already existed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistTarget {
    pub name: String,
    pub existing_provider_id: Option<String>,
    pub existing_track_uris: HashSet<String>,
}

impl PlaylistTarget {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub playlist_id: String,
    pub created: bool,
    pub added: usize,
    pub removed: usize,
}

pub struct PlaylistReconciler {
    provider: Arc<dyn ProviderClient>,
    settings: ReconcileSettings,
}

impl PlaylistReconciler {
    pub fn new(provider: Arc<dyn ProviderClient>, settings: ReconcileSettings) -> Self {
        Self { provider, settings }
    }

    /// Brings `target` up to date with `resolved_uris`.
    ///
    /// Provider failures are not retried here; the first one aborts the run
    /// and is returned. `target` reflects whatever was learned before that.
    pub async fn reconcile(
        &self,
        credentials: &Credentials,
        target: &mut PlaylistTarget,
        resolved_uris: &[String],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let user = self
            .provider
            .current_user(credentials)
            .await
            .map_err(ReconcileError::CurrentUser)?;

        if target.existing_provider_id.is_none() {
            target.existing_provider_id = self.find_playlist(credentials, &target.name).await?;
        }

        let playlist_id = match target.existing_provider_id.clone() {
            Some(id) => id,
            None => {
                let playlist_id = self.create_playlist(credentials, &user.id, target).await?;
                let mut new_uris = dedup(resolved_uris);
                if self.settings.policy == ReconcilePolicy::Capped {
                    new_uris.truncate(self.settings.max_tracks);
                }
                let added = self.append(credentials, &playlist_id, new_uris).await?;
                return Ok(ReconcileOutcome {
                    playlist_id,
                    created: true,
                    added,
                    removed: 0,
                });
            }
        };

        let entries = self.playlist_entries(credentials, &playlist_id).await?;
        let existing: Vec<String> = entries.iter().flatten().cloned().collect();
        let unavailable = entries.len() - existing.len();
        target.existing_track_uris = existing.iter().cloned().collect();

        let mut new_uris: Vec<String> = dedup(resolved_uris)
            .into_iter()
            .filter(|uri| !target.existing_track_uris.contains(uri))
            .collect();

        let mut removed = 0;
        if self.settings.policy == ReconcilePolicy::Capped {
            let plan = plan_eviction(
                &existing,
                unavailable,
                resolved_uris,
                new_uris.len(),
                self.settings.max_tracks,
            );
            new_uris.truncate(plan.admitted);
            self.evict(credentials, &playlist_id, &plan.evicted).await?;
            removed = plan.freed;
            for uri in &plan.evicted {
                target.existing_track_uris.remove(uri);
            }
        }

        let added = self.append(credentials, &playlist_id, new_uris).await?;

        info!(
            "Playlist '{}' reconciled: {} added, {} removed",
            target.name, added, removed
        );
        Ok(ReconcileOutcome {
            playlist_id,
            created: false,
            added,
            removed,
        })
    }

    /// First of the user's playlists with exactly this name.
    async fn find_playlist(
        &self,
        credentials: &Credentials,
        name: &str,
    ) -> Result<Option<String>, ReconcileError> {
        let limit = self.settings.page_size;
        let mut offset = 0;
        loop {
            let page = self
                .provider
                .user_playlists(credentials, offset, limit)
                .await
                .map_err(ReconcileError::ListPlaylists)?;

            if let Some(found) = page.items.iter().find(|p| p.name == name) {
                debug!("Found playlist '{}' ({})", name, found.id);
                return Ok(Some(found.id.clone()));
            }

            offset += page.items.len() as u32;
            if (page.items.len() as u32) < limit || offset >= page.total {
                return Ok(None);
            }
        }
    }

    async fn create_playlist(
        &self,
        credentials: &Credentials,
        user_id: &str,
        target: &mut PlaylistTarget,
    ) -> Result<String, ReconcileError> {
        let request = NewPlaylist {
            name: target.name.clone(),
            description: self.settings.description.clone(),
            public: self.settings.public,
        };
        let created = self
            .provider
            .create_playlist(credentials, user_id, &request)
            .await
            .map_err(|source| ReconcileError::CreatePlaylist {
                name: target.name.clone(),
                source,
            })?;

        info!("Created playlist '{}' ({})", target.name, created.id);
        target.existing_provider_id = Some(created.id.clone());
        Ok(created.id)
    }

    /// Every entry of the playlist, oldest first. `None` for entries that no
    /// longer resolve to a track.
    async fn playlist_entries(
        &self,
        credentials: &Credentials,
        playlist_id: &str,
    ) -> Result<Vec<Option<String>>, ReconcileError> {
        let limit = self.settings.page_size;
        let mut offset = 0;
        let mut entries = Vec::new();
        loop {
            let page = self
                .provider
                .playlist_tracks(credentials, playlist_id, offset, limit)
                .await
                .map_err(|source| ReconcileError::ReadTracks {
                    playlist_id: playlist_id.to_string(),
                    source,
                })?;

            let count = page.items.len() as u32;
            entries.extend(page.items.into_iter().map(|entry| entry.uri));
            offset += count;

            if count < limit || offset >= page.total {
                break;
            }
        }
        debug!("Playlist {} holds {} entries", playlist_id, entries.len());
        Ok(entries)
    }

    async fn append(
        &self,
        credentials: &Credentials,
        playlist_id: &str,
        uris: Vec<String>,
    ) -> Result<usize, ReconcileError> {
        if uris.is_empty() {
            debug!("Nothing to add to playlist {}", playlist_id);
            return Ok(0);
        }
        self.provider
            .add_tracks(credentials, playlist_id, &uris)
            .await
            .map_err(|source| ReconcileError::AddTracks {
                playlist_id: playlist_id.to_string(),
                source,
            })?;
        Ok(uris.len())
    }

    async fn evict(
        &self,
        credentials: &Credentials,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ReconcileError> {
        for chunk in uris.chunks(self.settings.removal_chunk_size.max(1)) {
            self.provider
                .remove_tracks(credentials, playlist_id, chunk)
                .await
                .map_err(|source| ReconcileError::RemoveTracks {
                    playlist_id: playlist_id.to_string(),
                    source,
                })?;
        }
        Ok(())
    }
}

fn dedup(uris: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    uris.iter()
        .filter(|uri| seen.insert(uri.as_str()))
        .cloned()
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
struct EvictionPlan {
    /// Existing URIs to remove, oldest first.
    evicted: Vec<String>,
    /// Playlist entries the eviction frees. Removing a URI drops every
    /// occurrence of it.
    freed: usize,
    /// How many of the new URIs fit once the eviction is done.
    admitted: usize,
}

/// Decides which existing entries make room for `incoming` new tracks.
///
/// The playlist size counts duplicates and the `unavailable` entries, which
/// cannot be removed by URI. Entries also present in `resolved` are never
/// evicted. If the new tracks alone do not fit, only the first ones that do
/// are admitted.
fn plan_eviction(
    existing: &[String],
    unavailable: usize,
    resolved: &[String],
    incoming: usize,
    max_tracks: usize,
) -> EvictionPlan {
    let keep: HashSet<&str> = resolved.iter().map(String::as_str).collect();
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    let mut unique_existing: Vec<&String> = Vec::new();
    for uri in existing {
        let count = occurrences.entry(uri.as_str()).or_insert(0);
        if *count == 0 {
            unique_existing.push(uri);
        }
        *count += 1;
    }

    let pinned = unavailable
        + existing
            .iter()
            .filter(|uri| keep.contains(uri.as_str()))
            .count();
    let admitted = incoming.min(max_tracks.saturating_sub(pinned));
    let overflow = (existing.len() + unavailable + admitted).saturating_sub(max_tracks);

    let mut evicted = Vec::new();
    let mut freed = 0;
    for uri in unique_existing {
        if freed >= overflow {
            break;
        }
        if keep.contains(uri.as_str()) {
            continue;
        }
        freed += occurrences[uri.as_str()];
        evicted.push(uri.clone());
    }

    EvictionPlan {
        evicted,
        freed,
        admitted,
    }
}
