//! Podcast episodes and their derived track listings.

mod feed;

pub use feed::{FeedError, FeedSource, RssFeedSource};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::extraction::{extract_with, ExtractOptions, TrackDescriptor};

/// One raw entry as returned by a feed, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub pub_date: Option<String>,
    pub description: Option<String>,
    pub enclosure_url: Option<String>,
}

/// A feed entry together with the track listing extracted from its description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Episode {
    pub title: String,
    pub publish_date: Option<DateTime<FixedOffset>>,
    #[serde(skip)]
    pub raw_content: String,
    pub audio_url: Option<String>,
    pub playlist: Vec<TrackDescriptor>,
}

impl Episode {
    /// Assembles an episode from a raw feed item.
    ///
    /// A missing description is treated as empty content and an unparseable
    /// `pubDate` as unknown, so a single odd item never fails the feed.
    pub fn from_raw(item: RawItem, options: ExtractOptions) -> Self {
        let raw_content = item.description.unwrap_or_default();
        let playlist = extract_with(&raw_content, options);
        let publish_date = item
            .pub_date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok());

        Self {
            title: item.title.unwrap_or_default(),
            publish_date,
            raw_content,
            audio_url: item.enclosure_url,
            playlist,
        }
    }
}

/// Assembles every item of a feed, keeping feed order.
pub fn assemble_episodes(items: Vec<RawItem>, options: ExtractOptions) -> Vec<Episode> {
    items
        .into_iter()
        .map(|item| Episode::from_raw(item, options))
        .collect()
}

/// Returns up to `limit` episodes, most recent first.
///
/// Dated episodes come before undated ones; equal or missing dates keep
/// feed order (the sort is stable).
pub fn latest_episodes(episodes: &[Episode], limit: usize) -> Vec<&Episode> {
    let mut sorted: Vec<&Episode> = episodes.iter().collect();
    sorted.sort_by(|a, b| match (a.publish_date, b.publish_date) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    sorted.truncate(limit);
    sorted
}
