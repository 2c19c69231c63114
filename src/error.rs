use std::path::PathBuf;

use thiserror::Error;

use crate::models::ArticleId;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Fatal for the whole sync.
    #[error("Feed error for {url}: {reason}")]
    Feed { url: String, reason: String },

    /// Local to one feed item; callers log and skip.
    #[error("Extraction failed for {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("Article {0} not found in cache")]
    NotFound(ArticleId),

    #[error("Cache is corrupt: article {id} has metadata but no content at {}", path.display())]
    CorruptStore { id: ArticleId, path: PathBuf },

    #[error("Failed to send to {to}: {reason}")]
    Send { to: String, reason: String },

    #[error("Failed to persist {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("Cache directory is locked by another run (remove {} if stale)", .0.display())]
    Locked(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("EPUB generation failed: {0}")]
    Epub(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AppError {
    pub fn persistence(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        AppError::Persistence {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
