//! HTTP client for the Spotify Web API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{
    CatalogMatch, Credentials, NewPlaylist, Page, PlaylistEntry, PlaylistSummary, ProviderClient,
    ProviderError, UserProfile,
};
use crate::extraction::TrackDescriptor;

pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";

/// Maximum number of URIs accepted by a single add/remove call.
const MAX_URIS_PER_REQUEST: usize = 100;

#[derive(Debug, Clone)]
pub struct SpotifyClientConfig {
    pub api_base_url: String,
    pub accounts_base_url: String,
    pub timeout_secs: u64,
}

impl Default for SpotifyClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            accounts_base_url: DEFAULT_ACCOUNTS_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// [`ProviderClient`] backed by the Spotify Web API.
///
/// Holds no token state: every call authenticates with the credentials it
/// is given.
#[derive(Clone)]
pub struct SpotifyClient {
    client: Client,
    api_base_url: String,
    accounts_base_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: Option<Paging<SpotifyTrack>>,
}

#[derive(Deserialize)]
struct Paging<T> {
    items: Vec<T>,
    #[serde(default)]
    total: u32,
}

#[derive(Deserialize)]
struct SpotifyTrack {
    uri: String,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
}

#[derive(Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Deserialize)]
struct PlaylistItem {
    track: Option<PlaylistItemTrack>,
}

#[derive(Deserialize)]
struct PlaylistItemTrack {
    uri: Option<String>,
}

impl SpotifyClient {
    pub fn new(config: SpotifyClientConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            accounts_base_url: config.accounts_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        #[cfg(feature = "slowdown")]
        tokio::time::sleep(Duration::from_millis(500)).await;

        let response = request.send().await?;
        check_status(response).await
    }
}

/// Maps non-success responses to [`ProviderError`].
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ProviderError::Unauthorized(message));
    }

    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ProviderClient for SpotifyClient {
    async fn refresh_access_token(
        &self,
        credentials: &Credentials,
    ) -> Result<Credentials, ProviderError> {
        debug!("Refreshing access token");
        let url = format!("{}/api/token", self.accounts_base_url);
        let request = self
            .client
            .post(&url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.as_str()),
            ]);

        let token: TokenResponse = self.send(request).await?.json().await?;

        Ok(Credentials {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .unwrap_or_else(|| credentials.refresh_token.clone()),
            ..credentials.clone()
        })
    }

    async fn search_tracks(
        &self,
        credentials: &Credentials,
        track: &TrackDescriptor,
        limit: u32,
    ) -> Result<Vec<CatalogMatch>, ProviderError> {
        let query = format!("track:{} artist:{}", track.title, track.artist);
        debug!("Searching catalog: {}", query);

        let limit = limit.to_string();
        let request = self
            .client
            .get(self.api("/search"))
            .bearer_auth(&credentials.access_token)
            .query(&[
                ("q", query.as_str()),
                ("type", "track"),
                ("limit", limit.as_str()),
            ]);

        let response: SearchResponse = self.send(request).await?.json().await?;

        Ok(response
            .tracks
            .map(|paging| paging.items)
            .unwrap_or_default()
            .into_iter()
            .map(|t| CatalogMatch {
                uri: t.uri,
                name: t.name,
                artists: t.artists.into_iter().map(|a| a.name).collect(),
            })
            .collect())
    }

    async fn current_user(&self, credentials: &Credentials) -> Result<UserProfile, ProviderError> {
        let request = self
            .client
            .get(self.api("/me"))
            .bearer_auth(&credentials.access_token);
        Ok(self.send(request).await?.json().await?)
    }

    async fn user_playlists(
        &self,
        credentials: &Credentials,
        offset: u32,
        limit: u32,
    ) -> Result<Page<PlaylistSummary>, ProviderError> {
        let request = self
            .client
            .get(self.api("/me/playlists"))
            .bearer_auth(&credentials.access_token)
            .query(&[("limit", limit), ("offset", offset)]);

        let paging: Paging<PlaylistSummary> = self.send(request).await?.json().await?;
        Ok(Page {
            items: paging.items,
            total: paging.total,
        })
    }

    async fn create_playlist(
        &self,
        credentials: &Credentials,
        user_id: &str,
        playlist: &NewPlaylist,
    ) -> Result<PlaylistSummary, ProviderError> {
        let request = self
            .client
            .post(self.api(&format!("/users/{}/playlists", user_id)))
            .bearer_auth(&credentials.access_token)
            .json(playlist);
        Ok(self.send(request).await?.json().await?)
    }

    async fn playlist_tracks(
        &self,
        credentials: &Credentials,
        playlist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<PlaylistEntry>, ProviderError> {
        let request = self
            .client
            .get(self.api(&format!("/playlists/{}/tracks", playlist_id)))
            .bearer_auth(&credentials.access_token)
            .query(&[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("fields", "items(track(uri)),total".to_string()),
            ]);

        let paging: Paging<PlaylistItem> = self.send(request).await?.json().await?;
        Ok(Page {
            items: paging
                .items
                .into_iter()
                .map(|item| PlaylistEntry {
                    uri: item.track.and_then(|t| t.uri),
                })
                .collect(),
            total: paging.total,
        })
    }

    async fn add_tracks(
        &self,
        credentials: &Credentials,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ProviderError> {
        let url = self.api(&format!("/playlists/{}/tracks", playlist_id));
        for chunk in uris.chunks(MAX_URIS_PER_REQUEST) {
            let request = self
                .client
                .post(&url)
                .bearer_auth(&credentials.access_token)
                .json(&json!({ "uris": chunk }));
            self.send(request).await?;
        }
        Ok(())
    }

    async fn remove_tracks(
        &self,
        credentials: &Credentials,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ProviderError> {
        let url = self.api(&format!("/playlists/{}/tracks", playlist_id));
        for chunk in uris.chunks(MAX_URIS_PER_REQUEST) {
            let tracks: Vec<_> = chunk.iter().map(|uri| json!({ "uri": uri })).collect();
            let request = self
                .client
                .delete(&url)
                .bearer_auth(&credentials.access_token)
                .json(&json!({ "tracks": tracks }));
            self.send(request).await?;
        }
        Ok(())
    }
}
