//! Read-through caching in front of the aggregator and the article client.
//!
//! Cache keys are the SHA-256 of a canonical request string, so equivalent
//! requests (same providers in any order, defaulted fields spelled out or
//! not) share one entry. Cache faults are logged and bypassed.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::aggregator::Aggregator;
use super::cancel::CancelToken;
use super::error::NewsError;
use super::request::ListNewsParams;
use super::types::{Article, ListNewsResponse};
use crate::content::ArticleClient;
use crate::feed::FeedFetcher;
use crate::storage::ResponseCache;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

pub struct NewsService<F, C> {
    aggregator: Aggregator<F>,
    articles: ArticleClient,
    cache: C,
    cache_ttl: Duration,
}

impl<F: FeedFetcher, C: ResponseCache> NewsService<F, C> {
    pub fn new(aggregator: Aggregator<F>, articles: ArticleClient, cache: C) -> Self {
        Self {
            aggregator,
            articles,
            cache,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Aggregated news for `params`, served from cache when fresh.
    ///
    /// Validation always runs first, so invalid requests fail the same way
    /// whether or not anything is cached.
    pub async fn list_news(
        &self,
        params: &ListNewsParams,
        cancel: &CancelToken,
    ) -> Result<ListNewsResponse, NewsError> {
        let request = self.aggregator.validate(params)?;
        let key = cache_key(&request.cache_key());

        if let Some(response) = self.cached::<ListNewsResponse>(&key).await {
            return Ok(response);
        }

        let news = self.aggregator.aggregate(&request, cancel).await?;
        let response = ListNewsResponse { news };
        self.store(&key, &response).await;
        Ok(response)
    }

    /// The scraped article at `url`, served from cache when fresh.
    pub async fn get_article(&self, url: &str, cancel: &CancelToken) -> Result<Article, NewsError> {
        let parsed = self.articles.validate(url)?;
        let key = cache_key(&format!("article|{parsed}"));

        if let Some(article) = self.cached::<Article>(&key).await {
            return Ok(article);
        }

        let article = self.articles.fetch(cancel, url).await?;
        self.store(&key, &article).await;
        Ok(article)
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(body)) => match serde_json::from_str(&body) {
                Ok(value) => {
                    tracing::debug!(key = %key, "Cache hit");
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, fetching live");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) {
        let body = match serde_json::to_string(value) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize response for cache");
                return;
            }
        };
        if let Err(e) = self.cache.put(key, &body, self.cache_ttl).await {
            tracing::warn!(key = %key, error = %e, "Cache write failed");
        }
    }
}

/// Hex SHA-256 of the canonical request text.
fn cache_key(canonical: &str) -> String {
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}
