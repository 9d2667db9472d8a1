//! Streaming provider collaborator.
//!
//! [`ProviderClient`] is the only way the crate talks to the streaming
//! service. Every call receives the [`Credentials`] explicitly; refreshing
//! them returns a new value.

mod models;
pub mod spotify;

pub use models::*;
pub use spotify::{SpotifyClient, SpotifyClientConfig};

use async_trait::async_trait;
use thiserror::Error;

use crate::extraction::TrackDescriptor;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Whether repeating the same call may succeed.
    ///
    /// Auth failures and client errors other than 429 are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_)
            | ProviderError::Timeout
            | ProviderError::RateLimited { .. }
            | ProviderError::Parse(_) => true,
            ProviderError::Unauthorized(_) => false,
            ProviderError::Api { status, .. } => *status >= 500,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Parse(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

/// Operations the core needs from the streaming service.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Exchange the refresh token for a fresh access token.
    async fn refresh_access_token(
        &self,
        credentials: &Credentials,
    ) -> Result<Credentials, ProviderError>;

    /// Search the catalog using structured artist and title fields.
    async fn search_tracks(
        &self,
        credentials: &Credentials,
        track: &TrackDescriptor,
        limit: u32,
    ) -> Result<Vec<CatalogMatch>, ProviderError>;

    async fn current_user(&self, credentials: &Credentials) -> Result<UserProfile, ProviderError>;

    /// One page of the current user's playlists.
    async fn user_playlists(
        &self,
        credentials: &Credentials,
        offset: u32,
        limit: u32,
    ) -> Result<Page<PlaylistSummary>, ProviderError>;

    async fn create_playlist(
        &self,
        credentials: &Credentials,
        user_id: &str,
        playlist: &NewPlaylist,
    ) -> Result<PlaylistSummary, ProviderError>;

    /// One page of a playlist's entries, in playlist order.
    async fn playlist_tracks(
        &self,
        credentials: &Credentials,
        playlist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<PlaylistEntry>, ProviderError>;

    /// Append tracks at the end of the playlist.
    async fn add_tracks(
        &self,
        credentials: &Credentials,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ProviderError>;

    /// Remove every occurrence of the given tracks from the playlist.
    async fn remove_tracks(
        &self,
        credentials: &Credentials,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ProviderError>;
}
