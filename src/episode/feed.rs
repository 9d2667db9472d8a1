//! Feed collaborator: fetches a podcast's RSS document and turns it into raw items.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::RawItem;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to fetch feed {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Feed {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse feed {url}: {message}")]
    Parse { url: String, message: String },
}

/// Source of raw feed items for a podcast.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch every item currently published in the feed, in feed order.
    async fn fetch_items(&self, url: &str) -> Result<Vec<RawItem>, FeedError>;
}

/// [`FeedSource`] reading RSS 2.0 documents over HTTP.
#[derive(Clone)]
pub struct RssFeedSource {
    client: Client,
}

impl RssFeedSource {
    pub fn new(timeout_secs: u64) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FeedError::Fetch {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Parse an RSS document already in memory.
    ///
    /// `content:encoded` is preferred over `description` when both exist.
    pub fn parse_items(url: &str, body: &[u8]) -> Result<Vec<RawItem>, FeedError> {
        let channel = rss::Channel::read_from(body).map_err(|e| FeedError::Parse {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(channel
            .items()
            .iter()
            .map(|item| RawItem {
                title: item.title().map(str::to_string),
                pub_date: item.pub_date().map(str::to_string),
                description: item
                    .content()
                    .or_else(|| item.description())
                    .map(str::to_string),
                enclosure_url: item.enclosure().map(|e| e.url().to_string()),
            })
            .collect())
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch_items(&self, url: &str) -> Result<Vec<RawItem>, FeedError> {
        debug!("Fetching feed {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| FeedError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Self::parse_items(url, &body)
    }
}
