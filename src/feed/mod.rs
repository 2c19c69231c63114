mod fetcher;
mod reconcile;

pub use fetcher::{FeedFetcher, FeedSource, Fetched};
pub use reconcile::{Reconciler, SyncReport};
