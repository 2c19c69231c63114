use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::ValueEnum;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::error::{AppError, Result};
use crate::feed::{FeedSource, Reconciler, SyncReport};
use crate::models::{ArticleId, SendStatus};
use crate::select::{select_unsent, SelectOptions};
use crate::services::{
    slugify, ArticleExtractor, BookMeta, Chapter, EpubAssembler, EpubFile, MailSender,
};

const BOOK_LANGUAGE: &str = "en";
const BOOK_AUTHOR: &str = "epubcast";

/// How selected articles are grouped into books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One book and one email per article.
    Individual,
    /// All selected articles in a single book and email.
    #[default]
    #[value(alias = "amalgamate")]
    #[serde(alias = "amalgamate")]
    Bundle,
}

/// Mail transport plus the address it sends from.
pub struct Delivery {
    pub sender: Box<dyn MailSender>,
    pub from: String,
}

/// The collaborators one run works with.
pub struct Services {
    pub feeds: Box<dyn FeedSource>,
    pub extractor: Box<dyn ArticleExtractor>,
    pub assembler: Box<dyn EpubAssembler>,
    pub delivery: Option<Delivery>,
}

#[derive(Debug, Clone, Default)]
pub struct CompileRequest {
    pub mode: Mode,
    pub recipient: Option<String>,
    pub selection: SelectOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Written,
    Sent,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct UnitReport {
    pub title: String,
    pub articles: Vec<ArticleId>,
    pub file: PathBuf,
    pub outcome: UnitOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct CompileReport {
    pub units: Vec<UnitReport>,
}

impl CompileReport {
    pub fn failures(&self) -> usize {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, UnitOutcome::Failed(_)))
            .count()
    }
}

/// One invocation: `open`, then `sync` and `compile`, then `close`.
pub struct App {
    cache: Cache,
    out_dir: PathBuf,
    reconciler: Reconciler,
    assembler: Box<dyn EpubAssembler>,
    delivery: Option<Delivery>,
}

impl App {
    pub fn open(out_dir: &Path, services: Services) -> Result<Self> {
        let cache = Cache::open(out_dir)?;
        Ok(Self {
            cache,
            out_dir: out_dir.to_path_buf(),
            reconciler: Reconciler::new(services.feeds, services.extractor),
            assembler: services.assembler,
            delivery: services.delivery,
        })
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Pull every source into the cache and persist the result.
    pub async fn sync(&mut self, urls: &[String]) -> Result<SyncReport> {
        let report = self
            .reconciler
            .reconcile_all(urls, self.cache.articles_mut())
            .await?;
        self.cache.flush()?;
        Ok(report)
    }

    /// Build books for everything not yet sent and deliver them.
    pub async fn compile(&mut self, request: &CompileRequest) -> Result<CompileReport> {
        let recipient = request.recipient.as_deref();
        if recipient.is_some() && self.delivery.is_none() {
            return Err(AppError::Config("a recipient was given but no mail transport is configured".to_string()));
        }
        if let Some(to) = recipient {
            to.parse::<Mailbox>()
                .map_err(|e| AppError::Config(format!("invalid recipient '{}': {}", to, e)))?;
        }

        let ids = select_unsent(
            self.cache.articles(),
            self.cache.ledger(),
            recipient,
            &request.selection,
        );
        if ids.is_empty() {
            tracing::info!("No unsent articles");
            return Ok(CompileReport::default());
        }
        tracing::info!("Compiling {} article(s) in {:?} mode", ids.len(), request.mode);

        match request.mode {
            Mode::Individual => self.compile_individual(ids, recipient).await,
            Mode::Bundle => self.compile_bundle(ids, recipient).await,
        }
    }

    /// One unit per article. A failed send is recorded and the next article
    /// is still attempted.
    async fn compile_individual(&mut self, ids: Vec<ArticleId>, recipient: Option<&str>) -> Result<CompileReport> {
        let mut report = CompileReport::default();

        for id in ids {
            let chapter = self.chapter(&id)?;
            let meta = BookMeta {
                title: chapter.title.clone(),
                author: chapter
                    .byline
                    .clone()
                    .or_else(|| chapter.site_name.clone())
                    .unwrap_or_else(|| BOOK_AUTHOR.to_string()),
                language: BOOK_LANGUAGE.to_string(),
            };
            let short_id: String = id.as_str().chars().take(8).collect();
            let filename = format!("{}-{}.epub", slugify(&meta.title), short_id);
            let epub = self.write_book(&meta, &[chapter], filename)?;

            let outcome = match recipient {
                None => UnitOutcome::Written,
                Some(to) => match self.deliver(to, &meta.title, &epub).await {
                    Ok(()) => {
                        self.cache.record_send(to, vec![id.clone()], SendStatus::Success)?;
                        UnitOutcome::Sent
                    }
                    Err(e) => {
                        tracing::warn!("Failed to send {}: {}", id, e);
                        self.cache.record_send(to, vec![id.clone()], SendStatus::Failed)?;
                        UnitOutcome::Failed(e.to_string())
                    }
                },
            };

            report.units.push(UnitReport {
                title: meta.title,
                articles: vec![id],
                file: self.out_dir.join(&epub.filename),
                outcome,
            });
        }

        Ok(report)
    }

    /// All articles in one unit. A failed send fails the whole batch.
    async fn compile_bundle(&mut self, ids: Vec<ArticleId>, recipient: Option<&str>) -> Result<CompileReport> {
        let chapters = ids
            .iter()
            .map(|id| self.chapter(id))
            .collect::<Result<Vec<_>>>()?;

        let now = Utc::now();
        let meta = BookMeta {
            title: format!("epubcast {}", now.format("%Y-%m-%d %H:%M")),
            author: BOOK_AUTHOR.to_string(),
            language: BOOK_LANGUAGE.to_string(),
        };
        let filename = format!("epubcast-{}.epub", now.format("%Y%m%d-%H%M%S"));
        let epub = self.write_book(&meta, &chapters, filename)?;

        let outcome = match recipient {
            None => UnitOutcome::Written,
            Some(to) => match self.deliver(to, &meta.title, &epub).await {
                Ok(()) => {
                    self.cache.record_send(to, ids.clone(), SendStatus::Success)?;
                    UnitOutcome::Sent
                }
                Err(e) => {
                    self.cache.record_send(to, ids.clone(), SendStatus::Failed)?;
                    return Err(e);
                }
            },
        };

        Ok(CompileReport {
            units: vec![UnitReport {
                title: meta.title,
                articles: ids,
                file: self.out_dir.join(&epub.filename),
                outcome,
            }],
        })
    }

    fn chapter(&self, id: &ArticleId) -> Result<Chapter> {
        let articles = self.cache.articles();
        let record = articles.get(id)?;
        let content = articles.load_content(id)?;
        let meta = record.readability_meta.as_ref();

        Ok(Chapter {
            title: record.title().to_string(),
            byline: record.byline().map(str::to_string),
            site_name: meta.and_then(|m| m.site_name.clone()),
            source_url: record.feed_item.link.clone(),
            content,
        })
    }

    fn write_book(&self, meta: &BookMeta, chapters: &[Chapter], filename: String) -> Result<EpubFile> {
        let bytes = self.assembler.build(meta, chapters)?;
        let path = self.out_dir.join(&filename);
        std::fs::write(&path, &bytes).map_err(|e| AppError::persistence(&path, e))?;
        tracing::debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(EpubFile { filename, bytes })
    }

    async fn deliver(&self, to: &str, subject: &str, epub: &EpubFile) -> Result<()> {
        let delivery = self
            .delivery
            .as_ref()
            .ok_or_else(|| AppError::Config("no mail transport configured".to_string()))?;
        delivery.sender.send(&delivery.from, to, subject, epub).await
    }

    /// Flush the cache and release the directory lock.
    pub fn close(self) -> Result<()> {
        self.cache.close()
    }
}
