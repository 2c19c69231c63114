use std::collections::HashSet;

use crate::cache::ArticleStore;
use crate::error::Result;
use crate::models::{identify, ArticleId, ArticleRecord, FeedEntry, FeedItem};
use crate::services::ArticleExtractor;

use super::fetcher::{FeedSource, Fetched};

/// Counters for one sync, logged by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub unchanged: usize,
    pub revived: usize,
    pub skipped: usize,
    pub failed: usize,
    pub tombstoned: usize,
    pub seen: HashSet<ArticleId>,
}

/// Brings the article store in line with the current contents of feeds.
pub struct Reconciler {
    source: Box<dyn FeedSource>,
    extractor: Box<dyn ArticleExtractor>,
}

impl Reconciler {
    pub fn new(source: Box<dyn FeedSource>, extractor: Box<dyn ArticleExtractor>) -> Self {
        Self { source, extractor }
    }

    /// Sync a single feed and tombstone everything it no longer lists.
    pub async fn reconcile(&self, url: &str, store: &mut ArticleStore) -> Result<HashSet<ArticleId>> {
        let mut report = SyncReport::default();
        self.sync_url(url, store, &mut report).await?;
        store.mark_deleted(&report.seen);
        Ok(report.seen)
    }

    /// Sync several sources into one store. Tombstoning runs once over the
    /// union of everything seen, so sources do not delete each other's items.
    pub async fn reconcile_all(&self, urls: &[String], store: &mut ArticleStore) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for url in urls {
            self.sync_url(url, store, &mut report).await?;
        }
        report.tombstoned = store.mark_deleted(&report.seen);

        tracing::info!(
            "Synced {} source(s): {} new, {} unchanged, {} revived, {} skipped, {} failed, {} tombstoned",
            urls.len(),
            report.added,
            report.unchanged,
            report.revived,
            report.skipped,
            report.failed,
            report.tombstoned
        );
        Ok(report)
    }

    async fn sync_url(&self, url: &str, store: &mut ArticleStore, report: &mut SyncReport) -> Result<()> {
        let entries = match self.source.fetch(url).await? {
            Fetched::Feed { title, entries } => {
                tracing::debug!(
                    "Feed {} ({}) lists {} entries",
                    url,
                    title.as_deref().unwrap_or("untitled"),
                    entries.len()
                );
                entries
            }
            Fetched::Page => vec![FeedEntry::direct(url)],
        };

        self.sync_entries(entries, store, report).await
    }

    /// Add unseen entries to the store. Per-entry problems are logged and
    /// skipped; only store write failures abort.
    pub async fn sync_entries(
        &self,
        entries: Vec<FeedEntry>,
        store: &mut ArticleStore,
        report: &mut SyncReport,
    ) -> Result<()> {
        for entry in entries {
            let Some(link) = entry.link.clone() else {
                tracing::warn!("Skipping entry '{}': no usable link", entry.guid);
                report.skipped += 1;
                continue;
            };

            let id = match identify(&link) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("Skipping entry '{}': {}", entry.guid, e);
                    report.skipped += 1;
                    continue;
                }
            };
            report.seen.insert(id.clone());

            if store.contains(&id) {
                if store.revive(&id) {
                    tracing::debug!("Article {} reappeared, clearing tombstone", id);
                    report.revived += 1;
                } else {
                    report.unchanged += 1;
                }
                continue;
            }

            let article = match self.extractor.extract(&link).await {
                Ok(article) => article,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", link, e);
                    report.failed += 1;
                    continue;
                }
            };

            store.put_content(&id, &article.content)?;

            let title = entry
                .title
                .clone()
                .or_else(|| article.meta.title.clone())
                .unwrap_or_else(|| link.clone());
            let feed_item = FeedItem {
                title,
                id: entry.guid,
                link,
                pub_date: entry.published_at,
                description: entry.description,
            };

            tracing::debug!("Added article {} ({})", id, feed_item.title);
            store.put(id, ArticleRecord::new(feed_item, article.meta));
            report.added += 1;
        }

        Ok(())
    }
}
