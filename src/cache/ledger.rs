use std::collections::HashSet;

use chrono::Utc;

use crate::models::{ArticleId, SendLedgerEntry, SendStatus};

/// Append-only log of delivery attempts.
#[derive(Debug, Default)]
pub struct SendLedger {
    entries: Vec<SendLedgerEntry>,
}

impl SendLedger {
    pub fn new(entries: Vec<SendLedgerEntry>) -> Self {
        Self { entries }
    }

    pub fn append(
        &mut self,
        recipient: &str,
        article_ids: Vec<ArticleId>,
        status: SendStatus,
    ) -> &SendLedgerEntry {
        self.entries.push(SendLedgerEntry {
            sent_at: Utc::now(),
            sent_to: recipient.to_string(),
            articles_sent: article_ids,
            status,
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Ids delivered successfully to `recipient`, or to anyone when `None`.
    pub fn sent_article_ids(&self, recipient: Option<&str>) -> HashSet<ArticleId> {
        self.entries
            .iter()
            .filter(|e| e.status == SendStatus::Success)
            .filter(|e| recipient.map_or(true, |r| e.sent_to == r))
            .flat_map(|e| e.articles_sent.iter().cloned())
            .collect()
    }

    pub fn entries(&self) -> &[SendLedgerEntry] {
        &self.entries
    }
}
