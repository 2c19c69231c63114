use std::time::Duration;

use async_trait::async_trait;
use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::Client;
use url::Url;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::FeedEntry;

/// What a fetched URL turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Feed {
        title: Option<String>,
        entries: Vec<FeedEntry>,
    },
    /// Not a feed: the URL is an article in its own right.
    Page,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fetched>;
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        let base = Url::parse(url).map_err(|e| AppError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let feed_error = |reason: String| AppError::Feed {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(base.clone())
            .send()
            .await
            .map_err(|e| feed_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(feed_error(format!("HTTP {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(|e| feed_error(e.to_string()))?;

        // Try parsing as RSS/Atom/JSON feed first; anything else is a page
        match parser::parse(&bytes[..]) {
            Ok(feed) => {
                let entries: Vec<FeedEntry> = feed
                    .entries
                    .into_iter()
                    .map(|entry| entry_from_feed(entry, &base))
                    .collect();
                tracing::debug!("Fetched {} entries from {}", entries.len(), url);
                Ok(Fetched::Feed {
                    title: feed.title.map(|t| t.content),
                    entries,
                })
            }
            Err(e) => {
                tracing::debug!("{} is not a feed ({}), treating it as an article", url, e);
                Ok(Fetched::Page)
            }
        }
    }
}

fn entry_from_feed(entry: Entry, base: &Url) -> FeedEntry {
    let link = entry
        .links
        .iter()
        .map(|l| l.href.trim())
        .find(|href| !href.is_empty())
        .map(|href| resolve_url(href, base))
        .or_else(|| {
            let id = entry.id.trim();
            (id.starts_with("http://") || id.starts_with("https://")).then(|| id.to_string())
        });

    FeedEntry {
        guid: entry.id,
        title: entry.title.map(|t| t.content),
        link,
        published_at: entry.published.or(entry.updated),
        description: entry.summary.map(|s| s.content),
    }
}

/// Resolve a potentially relative URL against the feed URL
fn resolve_url(href: &str, base: &Url) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    base.join(href)
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|_| href.to_string())
}
