use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{AppError, Result};

/// Number of digest bytes kept in an id (128 bits).
const ID_BYTES: usize = 16;

/// Content-addressed key of an article: truncated SHA-256 of its canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    #[cfg(test)]
    pub(crate) fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the id of an article from its link.
///
/// The fragment is dropped; scheme, host, path and query are kept as the
/// `url` crate normalizes them.
pub fn identify(link: &str) -> Result<ArticleId> {
    let mut url = Url::parse(link.trim()).map_err(|e| AppError::InvalidUrl {
        url: link.to_string(),
        reason: e.to_string(),
    })?;
    url.set_fragment(None);

    let digest = Sha256::digest(url.as_str().as_bytes());
    Ok(ArticleId(hex::encode(&digest[..ID_BYTES])))
}
