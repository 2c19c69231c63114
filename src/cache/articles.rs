use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::{ArticleId, ArticleRecord};

use super::snapshot::write_atomic;

/// Article metadata keyed by id, with bodies stored as `<id>.html` files
/// alongside the state file.
pub struct ArticleStore {
    dir: PathBuf,
    records: BTreeMap<ArticleId, ArticleRecord>,
}

impl ArticleStore {
    pub fn new(dir: impl Into<PathBuf>, records: BTreeMap<ArticleId, ArticleRecord>) -> Self {
        Self {
            dir: dir.into(),
            records,
        }
    }

    pub fn get(&self, id: &ArticleId) -> Result<&ArticleRecord> {
        self.records
            .get(id)
            .ok_or_else(|| AppError::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &ArticleId) -> bool {
        self.records.contains_key(id)
    }

    /// Insert a new record. For an existing id only the `deleted` flag is
    /// taken from `record`; feed data and metadata are write-once.
    pub fn put(&mut self, id: ArticleId, record: ArticleRecord) {
        match self.records.get_mut(&id) {
            Some(existing) => {
                if existing.feed_item != record.feed_item
                    || existing.readability_meta != record.readability_meta
                {
                    tracing::debug!("Ignoring rewrite of cached metadata for {}", id);
                }
                existing.deleted = record.deleted;
            }
            None => {
                self.records.insert(id, record);
            }
        }
    }

    /// Tombstone every record whose id is not in `present`. Returns how many
    /// records were newly flagged.
    pub fn mark_deleted(&mut self, present: &HashSet<ArticleId>) -> usize {
        let mut flagged = 0;
        for (id, record) in self.records.iter_mut() {
            if !record.deleted && !present.contains(id) {
                record.deleted = true;
                flagged += 1;
            }
        }
        flagged
    }

    /// Clear the tombstone of an article seen again. Returns true if it was set.
    pub fn revive(&mut self, id: &ArticleId) -> bool {
        match self.records.get_mut(id) {
            Some(record) if record.deleted => {
                record.deleted = false;
                true
            }
            _ => false,
        }
    }

    pub fn content_path(&self, id: &ArticleId) -> PathBuf {
        self.dir.join(format!("{}.html", id))
    }

    pub fn put_content(&self, id: &ArticleId, html: &str) -> Result<()> {
        write_atomic(&self.content_path(id), html.as_bytes())
    }

    /// Load an article body. Metadata without a body file is `CorruptStore`.
    pub fn load_content(&self, id: &ArticleId) -> Result<String> {
        self.get(id)?;

        let path = self.content_path(id);
        match fs::read_to_string(&path) {
            Ok(html) => Ok(html),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::CorruptStore {
                id: id.clone(),
                path,
            }),
            Err(e) => Err(AppError::persistence(path, e)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArticleId, &ArticleRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn records(&self) -> &BTreeMap<ArticleId, ArticleRecord> {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeedItem, ReadabilityMeta};
    use tempfile::TempDir;

    fn record(link: &str) -> ArticleRecord {
        ArticleRecord::new(
            FeedItem {
                title: link.to_string(),
                id: link.to_string(),
                link: link.to_string(),
                pub_date: None,
                description: None,
            },
            ReadabilityMeta::default(),
        )
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = ArticleStore::new("/nonexistent", BTreeMap::new());
        let id = ArticleId::from_hex("ab");
        assert!(matches!(store.get(&id), Err(AppError::NotFound(_))));
        assert!(matches!(store.load_content(&id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_put_keeps_feed_data_write_once() {
        let mut store = ArticleStore::new("/nonexistent", BTreeMap::new());
        let id = ArticleId::from_hex("01");
        store.put(id.clone(), record("https://example.com/original"));

        let mut rewrite = record("https://example.com/changed");
        rewrite.deleted = true;
        store.put(id.clone(), rewrite);

        let stored = store.get(&id).unwrap();
        assert!(stored.deleted);
        assert_eq!(stored.feed_item.link, "https://example.com/original");
    }

    #[test]
    fn test_mark_deleted_tombstones_without_removing() {
        let mut store = ArticleStore::new("/nonexistent", BTreeMap::new());
        let keep = ArticleId::from_hex("01");
        let gone = ArticleId::from_hex("02");
        store.put(keep.clone(), record("https://example.com/1"));
        store.put(gone.clone(), record("https://example.com/2"));

        let present: HashSet<_> = [keep.clone()].into_iter().collect();
        assert_eq!(store.mark_deleted(&present), 1);
        assert_eq!(store.mark_deleted(&present), 0);

        assert_eq!(store.len(), 2);
        assert!(!store.get(&keep).unwrap().deleted);
        assert!(store.get(&gone).unwrap().deleted);

        assert!(store.revive(&gone));
        assert!(!store.revive(&gone));
    }

    #[test]
    fn test_content_round_trips_through_disk() {
        let tmp = TempDir::new().unwrap();
        let mut store = ArticleStore::new(tmp.path(), BTreeMap::new());
        let id = ArticleId::from_hex("03");
        store.put(id.clone(), record("https://example.com/3"));
        store.put_content(&id, "<p>body</p>").unwrap();

        assert!(tmp.path().join("03.html").exists());
        assert_eq!(store.load_content(&id).unwrap(), "<p>body</p>");
    }

    #[test]
    fn test_missing_body_is_corrupt_store() {
        let tmp = TempDir::new().unwrap();
        let mut store = ArticleStore::new(tmp.path(), BTreeMap::new());
        let id = ArticleId::from_hex("04");
        store.put(id.clone(), record("https://example.com/4"));

        match store.load_content(&id) {
            Err(AppError::CorruptStore { id: bad, path }) => {
                assert_eq!(bad, id);
                assert_eq!(path, tmp.path().join("04.html"));
            }
            other => panic!("expected CorruptStore, got {:?}", other.map(|_| ())),
        }
    }
}
