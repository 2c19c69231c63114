mod articles;
mod ledger;
pub mod snapshot;

use std::fs;
use std::path::{Path, PathBuf};

pub use articles::ArticleStore;
pub use ledger::SendLedger;

use crate::error::{AppError, Result};
use crate::models::{ArticleId, SendStatus};

use snapshot::{CacheLock, STATE_FILE};

/// Exclusive handle on one cache directory: the article store and send
/// ledger loaded from `state.json`, held for the length of one run.
pub struct Cache {
    state_path: PathBuf,
    articles: ArticleStore,
    ledger: SendLedger,
    _lock: CacheLock,
}

impl Cache {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| AppError::persistence(dir, e))?;
        let lock = CacheLock::acquire(dir)?;

        let state_path = dir.join(STATE_FILE);
        let snapshot = snapshot::load(&state_path)?;
        tracing::debug!(
            "Opened cache {} ({} articles, {} emails)",
            state_path.display(),
            snapshot.articles.len(),
            snapshot.emails.len()
        );

        Ok(Self {
            state_path,
            articles: ArticleStore::new(dir, snapshot.articles),
            ledger: SendLedger::new(snapshot.emails),
            _lock: lock,
        })
    }

    pub fn articles(&self) -> &ArticleStore {
        &self.articles
    }

    pub fn articles_mut(&mut self) -> &mut ArticleStore {
        &mut self.articles
    }

    pub fn ledger(&self) -> &SendLedger {
        &self.ledger
    }

    /// Append a ledger entry and flush straight away, so a crash after a
    /// delivered email cannot lose the record of it.
    pub fn record_send(
        &mut self,
        recipient: &str,
        article_ids: Vec<ArticleId>,
        status: SendStatus,
    ) -> Result<()> {
        self.ledger.append(recipient, article_ids, status);
        self.flush()
    }

    pub fn flush(&self) -> Result<()> {
        snapshot::save(&self.state_path, self.ledger.entries(), self.articles.records())
    }

    pub fn close(self) -> Result<()> {
        self.flush()
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }
}
