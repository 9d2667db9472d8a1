//! Fake provider server lifecycle management
//!
//! Spawns an in-process HTTP server emulating the parts of the Spotify Web
//! API and accounts service the crate uses, plus a static RSS feed endpoint.
//! Each test gets an isolated server with its own state.

use super::constants::*;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Maximum number of URIs accepted by one add or remove request
const MAX_URIS_PER_REQUEST: usize = 100;

#[derive(Debug, Clone)]
pub struct StoredPlaylist {
    pub id: String,
    pub name: String,
    pub description: String,
    /// `None` for entries that no longer resolve to a track
    pub tracks: Vec<Option<String>>,
}

#[derive(Default)]
struct Inner {
    catalog: HashMap<String, (String, String, String)>,
    playlists: Vec<StoredPlaylist>,
    feeds: HashMap<String, String>,
    requests: Vec<String>,
    rate_limited_searches: u32,
}

/// State of the fake provider, shared between the server and the test.
#[derive(Default)]
pub struct FakeSpotify {
    inner: Mutex<Inner>,
}

impl FakeSpotify {
    pub fn add_track(&self, artist: &str, title: &str, uri: &str) {
        self.inner.lock().unwrap().catalog.insert(
            search_query(artist, title),
            (uri.to_string(), title.to_string(), artist.to_string()),
        );
    }

    /// Adds a playlist owned by the test user and returns its id.
    pub fn add_playlist(&self, name: &str, uris: &[&str]) -> String {
        let mut inner = self.inner.lock().unwrap();
        let id = format!("pl{:04}", inner.playlists.len() + 1);
        inner.playlists.push(StoredPlaylist {
            id: id.clone(),
            name: name.to_string(),
            description: String::new(),
            tracks: uris.iter().map(|u| Some(u.to_string())).collect(),
        });
        id
    }

    pub fn add_unavailable_entry(&self, playlist_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.playlists.iter_mut().find(|p| p.id == playlist_id) {
            p.tracks.push(None);
        }
    }

    pub fn add_feed(&self, file: &str, xml: String) {
        self.inner
            .lock()
            .unwrap()
            .feeds
            .insert(file.to_string(), xml);
    }

    /// The next `count` searches answer 429.
    pub fn rate_limit_searches(&self, count: u32) {
        self.inner.lock().unwrap().rate_limited_searches = count;
    }

    pub fn playlists(&self) -> Vec<StoredPlaylist> {
        self.inner.lock().unwrap().playlists.clone()
    }

    /// Track URIs of the first playlist with this name, in order.
    pub fn playlist_uris(&self, name: &str) -> Option<Vec<String>> {
        self.inner
            .lock()
            .unwrap()
            .playlists
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.tracks.iter().flatten().cloned().collect())
    }

    /// Number of requests received as `"METHOD /path"`.
    pub fn request_count(&self, method_and_path: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.as_str() == method_and_path)
            .count()
    }

    fn record(&self, request: String) {
        self.inner.lock().unwrap().requests.push(request);
    }
}

/// Query string the client is expected to send for a track.
pub fn search_query(artist: &str, title: &str) -> String {
    format!("track:{} artist:{}", title, artist)
}

/// Test server instance
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    pub spotify: Arc<FakeSpotify>,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new fake provider on a random port
    ///
    /// # Panics
    ///
    /// Panics if port binding fails.
    pub async fn spawn() -> Self {
        let spotify = Arc::new(FakeSpotify::default());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = make_app(spotify.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        Self {
            base_url,
            spotify,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL of the fake Web API
    pub fn api_base_url(&self) -> String {
        format!("{}/v1", self.base_url)
    }

    /// URL of a feed registered with [`FakeSpotify::add_feed`]
    pub fn feed_url(&self, file: &str) -> String {
        format!("{}/feeds/{}", self.base_url, file)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn make_app(state: Arc<FakeSpotify>) -> Router {
    Router::new()
        .route("/api/token", post(token))
        .route("/v1/me", get(me))
        .route("/v1/me/playlists", get(my_playlists))
        .route("/v1/users/{user_id}/playlists", post(create_playlist))
        .route(
            "/v1/playlists/{playlist_id}/tracks",
            get(playlist_tracks).post(add_tracks).delete(remove_tracks),
        )
        .route("/v1/search", get(search))
        .route("/feeds/{file}", get(feed))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

type SharedState = State<Arc<FakeSpotify>>;

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "status": status.as_u16(), "message": message } })),
    )
        .into_response()
}

fn is_authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", FRESH_ACCESS_TOKEN))
}

fn paging_params(params: &HashMap<String, String>) -> (usize, usize) {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);
    let offset = params
        .get("offset")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    (offset, limit)
}

async fn token(
    State(state): SharedState,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.record("POST /api/token".to_string());

    let basic_auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    let valid_grant = form.get("grant_type").map(String::as_str) == Some("refresh_token")
        && form.get("refresh_token").map(String::as_str) == Some(REFRESH_TOKEN);

    if !basic_auth || !valid_grant {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Invalid refresh token" })),
        )
            .into_response();
    }

    Json(json!({
        "access_token": FRESH_ACCESS_TOKEN,
        "token_type": "Bearer",
        "scope": "playlist-modify-public",
        "expires_in": 3600
    }))
    .into_response()
}

async fn me(State(state): SharedState, headers: HeaderMap) -> Response {
    state.record("GET /v1/me".to_string());
    if !is_authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "The access token expired");
    }
    Json(json!({ "id": USER_ID, "display_name": "Radio 3 Listener", "type": "user" }))
        .into_response()
}

async fn my_playlists(
    State(state): SharedState,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.record("GET /v1/me/playlists".to_string());
    if !is_authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "The access token expired");
    }

    let (offset, limit) = paging_params(&params);
    let inner = state.inner.lock().unwrap();
    let items: Vec<Value> = inner
        .playlists
        .iter()
        .skip(offset)
        .take(limit)
        .map(|p| json!({ "id": p.id, "name": p.name, "public": true }))
        .collect();

    Json(json!({
        "items": items,
        "limit": limit,
        "offset": offset,
        "total": inner.playlists.len()
    }))
    .into_response()
}

#[derive(Deserialize)]
struct CreatePlaylistBody {
    name: String,
    #[serde(default)]
    description: String,
}

async fn create_playlist(
    State(state): SharedState,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(body): Json<CreatePlaylistBody>,
) -> Response {
    state.record(format!("POST /v1/users/{}/playlists", user_id));
    if !is_authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "The access token expired");
    }
    if user_id != USER_ID {
        return error(StatusCode::FORBIDDEN, "You cannot create a playlist for another user");
    }

    let mut inner = state.inner.lock().unwrap();
    let id = format!("pl{:04}", inner.playlists.len() + 1);
    inner.playlists.push(StoredPlaylist {
        id: id.clone(),
        name: body.name.clone(),
        description: body.description,
        tracks: Vec::new(),
    });

    (
        StatusCode::CREATED,
        Json(json!({ "id": id, "name": body.name })),
    )
        .into_response()
}

async fn playlist_tracks(
    State(state): SharedState,
    headers: HeaderMap,
    Path(playlist_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.record(format!("GET /v1/playlists/{}/tracks", playlist_id));
    if !is_authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "The access token expired");
    }

    let (offset, limit) = paging_params(&params);
    let inner = state.inner.lock().unwrap();
    let Some(playlist) = inner.playlists.iter().find(|p| p.id == playlist_id) else {
        return error(StatusCode::NOT_FOUND, "Not found.");
    };

    let items: Vec<Value> = playlist
        .tracks
        .iter()
        .skip(offset)
        .take(limit)
        .map(|uri| match uri {
            Some(uri) => json!({ "track": { "uri": uri } }),
            None => json!({ "track": null }),
        })
        .collect();

    Json(json!({ "items": items, "total": playlist.tracks.len() })).into_response()
}

#[derive(Deserialize)]
struct AddTracksBody {
    uris: Vec<String>,
}

async fn add_tracks(
    State(state): SharedState,
    headers: HeaderMap,
    Path(playlist_id): Path<String>,
    Json(body): Json<AddTracksBody>,
) -> Response {
    state.record(format!("POST /v1/playlists/{}/tracks", playlist_id));
    if !is_authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "The access token expired");
    }
    if body.uris.is_empty() || body.uris.len() > MAX_URIS_PER_REQUEST {
        return error(StatusCode::BAD_REQUEST, "Invalid number of uris");
    }

    let mut inner = state.inner.lock().unwrap();
    let Some(playlist) = inner.playlists.iter_mut().find(|p| p.id == playlist_id) else {
        return error(StatusCode::NOT_FOUND, "Not found.");
    };
    playlist.tracks.extend(body.uris.into_iter().map(Some));

    (StatusCode::CREATED, Json(json!({ "snapshot_id": "snap" }))).into_response()
}

#[derive(Deserialize)]
struct RemoveTracksBody {
    tracks: Vec<TrackRef>,
}

#[derive(Deserialize)]
struct TrackRef {
    uri: String,
}

async fn remove_tracks(
    State(state): SharedState,
    headers: HeaderMap,
    Path(playlist_id): Path<String>,
    Json(body): Json<RemoveTracksBody>,
) -> Response {
    state.record(format!("DELETE /v1/playlists/{}/tracks", playlist_id));
    if !is_authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "The access token expired");
    }
    if body.tracks.len() > MAX_URIS_PER_REQUEST {
        return error(StatusCode::BAD_REQUEST, "Too many tracks");
    }

    let mut inner = state.inner.lock().unwrap();
    let Some(playlist) = inner.playlists.iter_mut().find(|p| p.id == playlist_id) else {
        return error(StatusCode::NOT_FOUND, "Not found.");
    };
    let removed: Vec<String> = body.tracks.into_iter().map(|t| t.uri).collect();
    playlist
        .tracks
        .retain(|t| !t.as_ref().is_some_and(|uri| removed.contains(uri)));

    Json(json!({ "snapshot_id": "snap" })).into_response()
}

async fn search(
    State(state): SharedState,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.record("GET /v1/search".to_string());
    if !is_authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "The access token expired");
    }
    if params.get("type").map(String::as_str) != Some("track") {
        return error(StatusCode::BAD_REQUEST, "Unsupported type");
    }

    let mut inner = state.inner.lock().unwrap();
    if inner.rate_limited_searches > 0 {
        inner.rate_limited_searches -= 1;
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "0")],
            Json(json!({ "error": { "status": 429, "message": "API rate limit exceeded" } })),
        )
            .into_response();
    }

    let query = params.get("q").cloned().unwrap_or_default();
    let items: Vec<Value> = inner
        .catalog
        .get(&query)
        .map(|(uri, name, artist)| {
            json!({ "uri": uri, "name": name, "artists": [{ "name": artist }] })
        })
        .into_iter()
        .collect();

    Json(json!({ "tracks": { "items": items, "total": items.len() } })).into_response()
}

async fn feed(State(state): SharedState, Path(file): Path<String>) -> Response {
    state.record(format!("GET /feeds/{}", file));
    match state.inner.lock().unwrap().feeds.get(&file) {
        Some(xml) => (
            [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
            xml.clone(),
        )
            .into_response(),
        None => error(StatusCode::NOT_FOUND, "No such feed"),
    }
}
