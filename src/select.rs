use chrono::{DateTime, Utc};
use clap::ValueEnum;

use crate::cache::{ArticleStore, SendLedger};
use crate::models::{ArticleId, ArticleRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderBy {
    Date,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectOptions {
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
    pub order_by: Option<OrderBy>,
    pub reverse: bool,
    pub max: Option<usize>,
}

impl SelectOptions {
    fn uses_dates(&self) -> bool {
        self.before.is_some() || self.after.is_some() || self.order_by == Some(OrderBy::Date)
    }
}

/// Articles not yet delivered to `recipient`, in send order.
///
/// Steps run in a fixed order: filter, sort, reverse, truncate. With no
/// recipient nothing is excluded beyond deleted articles. Articles are
/// otherwise listed in discovery order.
pub fn select_unsent(
    store: &ArticleStore,
    ledger: &SendLedger,
    recipient: Option<&str>,
    opts: &SelectOptions,
) -> Vec<ArticleId> {
    let sent = recipient
        .map(|r| ledger.sent_article_ids(Some(r)))
        .unwrap_or_default();

    let mut picked: Vec<(&ArticleId, &ArticleRecord)> = store
        .iter()
        .filter(|(id, record)| !record.deleted && !sent.contains(*id))
        .collect();
    picked.sort_by_key(|(_, record)| record.fetched_at);

    if opts.uses_dates() {
        picked.retain(|(_, record)| {
            let Some(published) = record.published_at() else {
                return false;
            };
            opts.before.map_or(true, |before| published < before)
                && opts.after.map_or(true, |after| published > after)
        });
    }

    if opts.order_by == Some(OrderBy::Date) {
        picked.sort_by_key(|(_, record)| record.published_at());
    }

    if opts.reverse {
        picked.reverse();
    }

    if let Some(max) = opts.max {
        picked.truncate(max);
    }

    picked.into_iter().map(|(id, _)| id.clone()).collect()
}
