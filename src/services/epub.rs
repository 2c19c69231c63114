use std::sync::LazyLock;

use epub_builder::{EpubBuilder, EpubContent, ReferenceType, ZipLibrary};
use quick_xml::escape::escape;
use regex::Regex;

use crate::error::{AppError, Result};

use super::xhtml::xhtml_fragment;

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

const MAX_SLUG_LEN: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct BookMeta {
    pub title: String,
    pub author: String,
    pub language: String,
}

/// One article rendered as a chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub title: String,
    pub byline: Option<String>,
    pub site_name: Option<String>,
    pub source_url: String,
    pub content: String,
}

pub trait EpubAssembler: Send + Sync {
    fn build(&self, meta: &BookMeta, chapters: &[Chapter]) -> Result<Vec<u8>>;
}

#[derive(Debug, Default)]
pub struct EpubWriter;

impl EpubAssembler for EpubWriter {
    fn build(&self, meta: &BookMeta, chapters: &[Chapter]) -> Result<Vec<u8>> {
        if chapters.is_empty() {
            return Err(AppError::Epub("no chapters to bundle".to_string()));
        }

        let mut builder = EpubBuilder::new(ZipLibrary::new().map_err(epub_error)?).map_err(epub_error)?;
        builder
            .metadata("title", meta.title.as_str())
            .map_err(epub_error)?
            .metadata("author", meta.author.as_str())
            .map_err(epub_error)?
            .metadata("lang", meta.language.as_str())
            .map_err(epub_error)?
            .metadata("generator", "epubcast")
            .map_err(epub_error)?;
        builder.inline_toc();

        for (index, chapter) in chapters.iter().enumerate() {
            let xhtml = chapter_xhtml(chapter, &meta.language)?;
            builder
                .add_content(
                    EpubContent::new(format!("chapter_{:03}.xhtml", index + 1), xhtml.as_bytes())
                        .title(chapter.title.as_str())
                        .reftype(ReferenceType::Text),
                )
                .map_err(epub_error)?;
        }

        let mut out = Vec::new();
        builder.generate(&mut out).map_err(epub_error)?;
        Ok(out)
    }
}

fn epub_error(err: impl std::fmt::Display) -> AppError {
    AppError::Epub(err.to_string())
}

fn chapter_xhtml(chapter: &Chapter, language: &str) -> Result<String> {
    let mut header = format!("<h1>{}</h1>\n", escape(&chapter.title));
    let credit = match (&chapter.byline, &chapter.site_name) {
        (Some(byline), Some(site)) => Some(format!("{}, {}", byline, site)),
        (Some(byline), None) => Some(byline.clone()),
        (None, Some(site)) => Some(site.clone()),
        (None, None) => None,
    };
    if let Some(credit) = credit {
        header.push_str(&format!("<p class=\"byline\">{}</p>\n", escape(&credit)));
    }
    header.push_str(&format!(
        "<p class=\"source\"><a href=\"{0}\">{0}</a></p>\n<hr/>\n",
        escape(&chapter.source_url)
    ));

    let content = xhtml_fragment(&chapter.content)?;

    Ok(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="{lang}" lang="{lang}">
<head><meta charset="UTF-8"/><title>{title}</title></head>
<body>
{header}{content}
</body>
</html>
"#,
        lang = escape(language),
        title = escape(&chapter.title),
        header = header,
        content = content,
    ))
}

/// File-name-safe form of a title.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let slug = NON_SLUG.replace_all(&lower, "-");
    let slug: String = slug.trim_matches('-').chars().take(MAX_SLUG_LEN).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}
