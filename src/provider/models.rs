//! Provider-side values as seen by the rest of the crate.
//!
//! Identifiers and URIs are opaque strings; nothing outside the provider
//! client looks inside them.

use serde::{Deserialize, Serialize};

/// Credentials for one provider session.
///
/// Immutable: a token refresh produces a new value instead of mutating this one.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// The user the credentials belong to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
}

/// Parameters for a playlist creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPlaylist {
    pub name: String,
    pub description: String,
    pub public: bool,
}

/// The top search result for a track descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogMatch {
    pub uri: String,
    pub name: String,
    pub artists: Vec<String>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages, as reported by the provider.
    pub total: u32,
}

/// A playlist entry. `uri` is `None` for entries the provider no longer
/// resolves to a track (removed from the catalog, podcast episodes, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub uri: Option<String>,
}
