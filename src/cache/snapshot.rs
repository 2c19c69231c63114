use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{AppError, Result};
use crate::models::{ArticleId, ArticleRecord, SendLedgerEntry};

pub const STATE_FILE: &str = "state.json";
pub const LOCK_FILE: &str = "state.lock";

/// On-disk form of the cache: ledger plus article metadata.
#[derive(Debug, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub emails: Vec<SendLedgerEntry>,
    #[serde(default)]
    pub articles: BTreeMap<ArticleId, ArticleRecord>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    emails: &'a [SendLedgerEntry],
    articles: &'a BTreeMap<ArticleId, ArticleRecord>,
}

/// Read the snapshot at `path`. A missing file is an empty cache.
pub fn load(path: &Path) -> Result<Snapshot> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("No cache at {}, starting empty", path.display());
            return Ok(Snapshot::default());
        }
        Err(e) => return Err(AppError::persistence(path, e)),
    };

    serde_json::from_str(&content).map_err(|e| AppError::persistence(path, e))
}

pub fn save(
    path: &Path,
    emails: &[SendLedgerEntry],
    articles: &BTreeMap<ArticleId, ArticleRecord>,
) -> Result<()> {
    let json = serde_json::to_vec_pretty(&SnapshotRef { emails, articles })?;
    write_atomic(path, &json)
}

/// Write through a temp file in the target's directory and rename over it,
/// so readers see either the old or the new contents.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| AppError::persistence(path, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| AppError::persistence(path, e))?;
    tmp.persist(path).map_err(|e| AppError::persistence(path, e.error))?;
    Ok(())
}

/// Exclusive claim on a cache directory for one invocation.
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
}

impl CacheLock {
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(AppError::Locked(path)),
            Err(e) => Err(AppError::persistence(path, e)),
        }
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_cache() {
        let tmp = TempDir::new().unwrap();
        let snapshot = load(&tmp.path().join(STATE_FILE)).unwrap();
        assert!(snapshot.emails.is_empty());
        assert!(snapshot.articles.is_empty());
    }

    #[test]
    fn test_unparseable_file_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(STATE_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(AppError::Persistence { .. })));
    }

    #[test]
    fn test_save_writes_documented_layout() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(STATE_FILE);
        save(&path, &[], &BTreeMap::new()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value["emails"].as_array().unwrap().is_empty());
        assert!(value["articles"].as_object().unwrap().is_empty());

        // only the state file is left behind, no temp files
        let names: Vec<_> = fs::read_dir(tmp.path()).unwrap().flatten().map(|e| e.file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from(STATE_FILE)]);
    }

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        let lock = CacheLock::acquire(tmp.path()).unwrap();
        assert!(matches!(CacheLock::acquire(tmp.path()), Err(AppError::Locked(_))));
        drop(lock);
        assert!(CacheLock::acquire(tmp.path()).is_ok());
    }
}
