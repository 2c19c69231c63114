mod article;
mod article_id;
mod email;

pub use article::{ArticleRecord, ExtractedArticle, FeedEntry, FeedItem, ReadabilityMeta};
pub use article_id::{identify, ArticleId};
pub use email::{SendLedgerEntry, SendStatus};
