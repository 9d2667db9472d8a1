//! Podcast Playlist Sync Library
//!
//! Extracts track listings from podcast episode descriptions and keeps a
//! streaming playlist per podcast in sync with them.

pub mod config;
pub mod episode;
pub mod extraction;
pub mod provider;
pub mod reconcile;
pub mod resolver;
pub mod sync;

// Re-export commonly used types for convenience
pub use episode::{Episode, FeedSource, RssFeedSource};
pub use extraction::{extract, extract_with, ExtractOptions, TrackDescriptor};
pub use provider::{Credentials, ProviderClient, ProviderError, SpotifyClient};
pub use reconcile::{PlaylistReconciler, PlaylistTarget, ReconcilePolicy};
pub use resolver::{CatalogResolver, ResolvedTrack};
pub use sync::{BatchSummary, PodcastSyncer};
