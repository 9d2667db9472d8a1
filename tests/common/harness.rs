//! Builders wiring the crate's real components to a [`TestServer`]
//!
//! When constructor signatures change, update only this file.

use super::constants::*;
use super::server::TestServer;
use podcast_playlist_sync::config::{ReconcileSettings, ResolverSettings, SyncSettings};
use podcast_playlist_sync::{
    CatalogResolver, Credentials, PlaylistReconciler, PodcastSyncer, RssFeedSource, SpotifyClient,
};
use podcast_playlist_sync::provider::SpotifyClientConfig;
use std::sync::Arc;

/// Credentials as a caller holds them before the first refresh.
pub fn stale_credentials() -> Credentials {
    Credentials {
        client_id: CLIENT_ID.to_string(),
        client_secret: CLIENT_SECRET.to_string(),
        access_token: STALE_ACCESS_TOKEN.to_string(),
        refresh_token: REFRESH_TOKEN.to_string(),
    }
}

/// Credentials the fake API accepts without a refresh.
pub fn fresh_credentials() -> Credentials {
    Credentials {
        access_token: FRESH_ACCESS_TOKEN.to_string(),
        ..stale_credentials()
    }
}

/// Provider client pointed at the fake server
pub fn spotify_client(server: &TestServer) -> SpotifyClient {
    SpotifyClient::new(SpotifyClientConfig {
        api_base_url: server.api_base_url(),
        accounts_base_url: server.base_url.clone(),
        timeout_secs: CLIENT_TIMEOUT_SECS,
    })
    .expect("Failed to build provider client")
}

pub fn feed_source() -> RssFeedSource {
    RssFeedSource::new(CLIENT_TIMEOUT_SECS).expect("Failed to build feed client")
}

/// Retry settings with millisecond backoff so rate-limit tests stay fast.
pub fn fast_resolver_settings() -> ResolverSettings {
    ResolverSettings {
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        ..ResolverSettings::default()
    }
}

/// Full pipeline over HTTP, as the binary builds it.
pub fn syncer(server: &TestServer, reconcile: ReconcileSettings) -> PodcastSyncer {
    let provider = Arc::new(spotify_client(server));
    let resolver = CatalogResolver::new(provider.clone(), &fast_resolver_settings());
    let reconciler = PlaylistReconciler::new(provider.clone(), reconcile);
    PodcastSyncer::new(
        provider,
        Arc::new(feed_source()),
        resolver,
        reconciler,
        &SyncSettings::default(),
    )
}
