use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An entry as reported by the feed parser, before it has an id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub guid: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl FeedEntry {
    /// Entry standing in for a page that was requested directly.
    pub fn direct(url: &str) -> Self {
        Self {
            guid: url.to_string(),
            link: Some(url.to_string()),
            ..Default::default()
        }
    }
}

/// Feed data captured when the article was discovered. Never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub id: String,
    pub link: String,
    #[serde(rename = "pubDate", default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadabilityMeta {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub length: usize,
    pub excerpt: Option<String>,
    pub site_name: Option<String>,
}

/// Extractor output: metadata plus the readable body.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedArticle {
    pub meta: ReadabilityMeta,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    #[serde(default)]
    pub deleted: bool,
    pub feed_item: FeedItem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readability_meta: Option<ReadabilityMeta>,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl ArticleRecord {
    pub fn new(feed_item: FeedItem, meta: ReadabilityMeta) -> Self {
        Self {
            deleted: false,
            feed_item,
            readability_meta: Some(meta),
            fetched_at: Some(Utc::now()),
        }
    }

    /// Feed title, falling back to the extracted one when the feed had none.
    pub fn title(&self) -> &str {
        if !self.feed_item.title.trim().is_empty() {
            return &self.feed_item.title;
        }
        self.readability_meta
            .as_ref()
            .and_then(|m| m.title.as_deref())
            .unwrap_or(&self.feed_item.link)
    }

    pub fn byline(&self) -> Option<&str> {
        self.readability_meta.as_ref().and_then(|m| m.byline.as_deref())
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.feed_item.pub_date
    }
}
