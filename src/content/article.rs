use std::time::Duration;

use scraper::{Html, Selector};

use crate::feed::fetcher::read_limited_bytes;
use crate::feed::FetchError;
use crate::news::{Article, CancelToken, NewsError};
use crate::util::validate_url;

pub const DEFAULT_ARTICLE_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_MAX_ARTICLE_BYTES: usize = 5 * 1024 * 1024; // 5MB

/// Fetches a single web page and scrapes it into an [`Article`].
///
/// One GET, no retries.
#[derive(Debug, Clone)]
pub struct ArticleClient {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
    allow_private_hosts: bool,
}

impl ArticleClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_ARTICLE_TIMEOUT,
            max_bytes: DEFAULT_MAX_ARTICLE_BYTES,
            allow_private_hosts: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }

    /// Checks `url` without fetching it.
    pub fn validate(&self, url: &str) -> Result<url::Url, NewsError> {
        validate_url(url, self.allow_private_hosts)
            .map_err(|e| NewsError::argument(format!("article url: {e}")))
    }

    /// Downloads `url` and extracts its headline, summary and body text.
    ///
    /// # Errors
    ///
    /// - [`NewsError::Argument`] when the URL is not an acceptable http(s) URL
    /// - [`NewsError::Transport`] on network failure, timeout, non-2xx status
    ///   or an oversized body
    /// - [`NewsError::Cancelled`] when `cancel` fires first
    pub async fn fetch(&self, cancel: &CancelToken, url: &str) -> Result<Article, NewsError> {
        let parsed = self.validate(url)?;

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(NewsError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.download(parsed.as_str())) => {
                result.map_err(|_| FetchError::Timeout)??
            }
        };

        let html = String::from_utf8_lossy(&body);
        let article = extract_article(&html, url)?;
        tracing::debug!(
            url = %url,
            bytes = body.len(),
            has_title = !article.title.is_empty(),
            content_len = article.content.len(),
            "Scraped article"
        );
        Ok(article)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }
        read_limited_bytes(response, self.max_bytes).await
    }
}

fn selector(css: &str) -> Result<Selector, NewsError> {
    Selector::parse(css).map_err(|e| NewsError::Parse(format!("selector {css}: {e}")))
}

/// Scrapes an HTML page.
///
/// When a section occurs more than once the last occurrence wins: the last
/// `<h1>` text, the last `<meta name="description">` content attribute and
/// the last `<article>` text. Missing sections are left empty.
pub fn extract_article(html: &str, link: &str) -> Result<Article, NewsError> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("h1")?)
        .last()
        .map(|h1| h1.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let description = document
        .select(&selector("meta[name=description]")?)
        .last()
        .and_then(|meta| meta.value().attr("content"))
        .unwrap_or_default()
        .to_string();

    let content = document
        .select(&selector("article")?)
        .last()
        .map(|article| article.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    Ok(Article {
        title,
        description,
        content,
        link: link.to_string(),
    })
}
