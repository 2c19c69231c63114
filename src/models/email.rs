use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ArticleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SendStatus {
    Success,
    Failed,
}

/// One delivery attempt. Entries are immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendLedgerEntry {
    pub sent_at: DateTime<Utc>,
    pub sent_to: String,
    pub articles_sent: Vec<ArticleId>,
    pub status: SendStatus,
}
