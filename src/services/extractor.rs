use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{ExtractedArticle, ReadabilityMeta};

use super::xhtml::xhtml_children;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Candidate containers for the article body, most specific first.
const CONTENT_SELECTORS: [&str; 4] = ["article", "main", "[role=main]", "body"];

#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<ExtractedArticle>;
}

pub struct ReadableExtractor {
    client: Client,
}

impl ReadableExtractor {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| AppError::Config(format!("invalid user_agent: {}", e)))?;
        headers.insert(USER_AGENT, user_agent);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ArticleExtractor for ReadableExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractedArticle> {
        let extraction_error = |reason: String| AppError::Extraction {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| extraction_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(extraction_error(format!("HTTP {}", response.status())));
        }

        let html = response.text().await.map_err(|e| extraction_error(e.to_string()))?;

        extract_readable(&html, url)
    }
}

/// Pull metadata and the main body out of a page.
pub fn extract_readable(html: &str, url: &str) -> Result<ExtractedArticle> {
    let doc = Html::parse_document(html);

    let extraction_error = |reason: String| AppError::Extraction {
        url: url.to_string(),
        reason,
    };

    let mut content = None;
    for el in CONTENT_SELECTORS.iter().filter_map(|css| select_first(&doc, css)) {
        let body = xhtml_children(el).map_err(|e| extraction_error(e.to_string()))?;
        if !text_of(&body).trim().is_empty() {
            content = Some(body);
            break;
        }
    }
    let content = content.ok_or_else(|| extraction_error("no readable content".to_string()))?;

    let text = text_of(&content);

    let title = meta_content(&doc, "meta[property='og:title']")
        .or_else(|| element_text(&doc, "title"))
        .or_else(|| element_text(&doc, "h1"));

    let byline = meta_content(&doc, "meta[name='author']")
        .or_else(|| element_text(&doc, "[rel=author]"));

    let site_name = meta_content(&doc, "meta[property='og:site_name']").or_else(|| {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
    });

    let excerpt = meta_content(&doc, "meta[name='description']")
        .or_else(|| meta_content(&doc, "meta[property='og:description']"))
        .or_else(|| element_text(&doc, "p"));

    Ok(ExtractedArticle {
        meta: ReadabilityMeta {
            title,
            byline,
            length: text.trim().chars().count(),
            excerpt,
            site_name,
        },
        content,
    })
}

fn select_first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector).next()
}

fn meta_content(doc: &Html, css: &str) -> Option<String> {
    select_first(doc, css)
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn element_text(doc: &Html, css: &str) -> Option<String> {
    select_first(doc, css)
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
}

/// Plain-text rendering of an HTML body.
fn text_of(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 80) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
        <title>Fallback Title</title>
        <meta property="og:title" content="The Real Title">
        <meta property="og:site_name" content="Example News">
        <meta name="author" content="Ada Lovelace">
        <meta name="description" content="A short summary.">
        <script>var tracking = 1;</script>
    </head><body>
        <nav>Home | About</nav>
        <article>
            <h1>The Real Title</h1>
            <script>alert("x")</script>
            <p>First paragraph of the story.</p>
            <p>Second paragraph.</p>
        </article>
    </body></html>"#;

    #[test]
    fn test_extracts_metadata() {
        let article = extract_readable(PAGE, "https://www.example.com/story").unwrap();
        assert_eq!(article.meta.title.as_deref(), Some("The Real Title"));
        assert_eq!(article.meta.byline.as_deref(), Some("Ada Lovelace"));
        assert_eq!(article.meta.site_name.as_deref(), Some("Example News"));
        assert_eq!(article.meta.excerpt.as_deref(), Some("A short summary."));
        assert!(article.meta.length > 0);
    }

    #[test]
    fn test_content_prefers_article_and_drops_scripts() {
        let article = extract_readable(PAGE, "https://example.com/story").unwrap();
        assert!(article.content.contains("First paragraph"));
        assert!(!article.content.contains("alert"));
        assert!(!article.content.contains("Home | About"));
    }

    #[test]
    fn test_fallbacks_without_meta_tags() {
        let html = "<html><head><title>Plain</title></head><body><p>Only text here.</p></body></html>";
        let article = extract_readable(html, "https://www.plain.org/x").unwrap();
        assert_eq!(article.meta.title.as_deref(), Some("Plain"));
        assert_eq!(article.meta.site_name.as_deref(), Some("plain.org"));
        assert_eq!(article.meta.excerpt.as_deref(), Some("Only text here."));
        assert_eq!(article.meta.byline, None);
    }

    #[test]
    fn test_body_is_stored_as_xhtml() {
        let html = "<article><p>One&nbsp;two<br>three</p><img src=a.png></article>";
        let article = extract_readable(html, "https://example.com/x").unwrap();
        assert_eq!(article.content, "<p>One\u{a0}two<br/>three</p><img src=\"a.png\"/>");
    }

    #[test]
    fn test_empty_page_is_extraction_error() {
        let result = extract_readable("<html><body>   </body></html>", "https://example.com/");
        assert!(matches!(result, Err(AppError::Extraction { .. })));
    }
}
