//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{AppError, Result};
use crate::feed::{FeedSource, Fetched};
use crate::models::{ExtractedArticle, FeedEntry, ReadabilityMeta};
use crate::services::{ArticleExtractor, BookMeta, Chapter, EpubAssembler, EpubFile, MailSender};

/// Entry `name` linking to `https://example.com/<name>`, optionally dated `YYYY-MM-DD`.
pub fn entry(name: &str, published: Option<&str>) -> FeedEntry {
    FeedEntry {
        guid: format!("guid-{}", name),
        title: Some(format!("Title {}", name)),
        link: Some(format!("https://example.com/{}", name)),
        published_at: published.map(|d| {
            let date = NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap();
            Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
        }),
        description: None,
    }
}

/// Parse `xml` to the end, failing on the first well-formedness error.
pub fn assert_well_formed(xml: &str) {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Text(text)) => {
                text.unescape().unwrap();
            }
            Ok(_) => {}
            Err(e) => panic!("not well-formed at {}: {}\n{}", reader.buffer_position(), e, xml),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeFeeds {
    feeds: Arc<Mutex<HashMap<String, Fetched>>>,
}

impl FakeFeeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, fetched: Fetched) {
        self.feeds.lock().unwrap().insert(url.to_string(), fetched);
    }
}

#[async_trait]
impl FeedSource for FakeFeeds {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        self.feeds
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Feed {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}

#[derive(Clone, Default)]
pub struct FakeExtractor {
    calls: Arc<AtomicUsize>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleExtractor for FakeExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractedArticle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(url) {
            return Err(AppError::Extraction {
                url: url.to_string(),
                reason: "HTTP 500".to_string(),
            });
        }
        Ok(ExtractedArticle {
            meta: ReadabilityMeta {
                title: Some(format!("Extracted {}", url)),
                byline: Some("Staff".to_string()),
                length: 12,
                excerpt: None,
                site_name: Some("example.com".to_string()),
            },
            content: format!("<p>Body of {}</p>", url),
        })
    }
}

/// Writes chapter titles instead of a real EPUB.
pub struct FakeAssembler;

impl EpubAssembler for FakeAssembler {
    fn build(&self, meta: &BookMeta, chapters: &[Chapter]) -> Result<Vec<u8>> {
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        Ok(format!("{}: {}", meta.title, titles.join(", ")).into_bytes())
    }
}

#[derive(Clone, Default)]
pub struct FakeMailer {
    sent: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    fail_all: Arc<AtomicBool>,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail sends whose subject is `subject`.
    pub fn fail_on(&self, subject: &str) {
        self.failing.lock().unwrap().insert(subject.to_string());
    }

    pub fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    /// Subjects delivered so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for FakeMailer {
    async fn send(&self, _from: &str, to: &str, subject: &str, _attachment: &EpubFile) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(subject) {
            return Err(AppError::Send {
                to: to.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        self.sent.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}
