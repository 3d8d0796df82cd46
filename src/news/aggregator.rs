//! Concurrent multi-feed aggregation.
//!
//! One task per work item runs fetch (under the retry policy) and
//! normalization, reporting on one of two channels: item batches or
//! errors. The collector returns the first error it sees and otherwise
//! merges batches in task-start order before sorting. Returning early drops
//! the [`JoinSet`], which aborts every sibling still in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use super::cancel::CancelToken;
use super::error::NewsError;
use super::request::{FeedTable, ListNewsParams, ListNewsRequest};
use super::sort::sort_by_publish_date;
use super::types::{FeedWorkItem, NewsItem};
use crate::feed::{normalize, FeedFetcher, RetryPolicy};

/// Tuning for [`Aggregator`].
#[derive(Debug, Clone, Default)]
pub struct AggregatorOptions {
    pub retry: RetryPolicy,
    /// Maximum simultaneous fetches; 0 means one task per work item with
    /// no cap.
    pub max_concurrent: usize,
    /// Overall deadline for one aggregation, including retry delays.
    pub request_timeout: Option<Duration>,
    /// Accept ad-hoc source URLs on localhost or private networks.
    pub allow_private_hosts: bool,
}

/// Validates aggregation requests and runs them against a [`FeedFetcher`].
pub struct Aggregator<F> {
    fetcher: Arc<F>,
    table: Arc<FeedTable>,
    options: AggregatorOptions,
}

impl<F> Clone for Aggregator<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            table: Arc::clone(&self.table),
            options: self.options.clone(),
        }
    }
}

impl<F: FeedFetcher> Aggregator<F> {
    pub fn new(fetcher: F, table: FeedTable, options: AggregatorOptions) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            table: Arc::new(table),
            options,
        }
    }

    pub fn table(&self) -> &FeedTable {
        &self.table
    }

    /// Checks `params` against this aggregator's feed table without any I/O.
    pub fn validate(&self, params: &ListNewsParams) -> Result<ListNewsRequest, NewsError> {
        params.validate(&self.table, self.options.allow_private_hosts)
    }

    /// Validates `params`, then aggregates.
    pub async fn list_news(
        &self,
        params: &ListNewsParams,
        cancel: &CancelToken,
    ) -> Result<Vec<NewsItem>, NewsError> {
        let request = self.validate(params)?;
        self.aggregate(&request, cancel).await
    }

    /// Fetches every work item of `request` concurrently and returns the
    /// merged items sorted by publish date.
    ///
    /// # Errors
    ///
    /// The first error reported by any fetch task, [`NewsError::Cancelled`]
    /// when `cancel` fires, or [`NewsError::Timeout`] when the configured
    /// deadline passes. Partial results are never returned.
    pub async fn aggregate(
        &self,
        request: &ListNewsRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<NewsItem>, NewsError> {
        let work = request.work_items(&self.table);
        let feeds = work.len();

        let collected = match self.options.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.collect(work, cancel))
                .await
                .map_err(|_| NewsError::Timeout(limit))?,
            None => self.collect(work, cancel).await,
        };
        let mut items = collected?;

        sort_by_publish_date(&mut items, request.sort);
        tracing::info!(
            feeds = feeds,
            items = items.len(),
            sort = %request.sort,
            "Aggregated news"
        );
        Ok(items)
    }

    async fn collect(
        &self,
        work: Vec<FeedWorkItem>,
        cancel: &CancelToken,
    ) -> Result<Vec<NewsItem>, NewsError> {
        if cancel.is_cancelled() {
            return Err(NewsError::Cancelled);
        }
        if work.is_empty() {
            return Ok(Vec::new());
        }

        let total = work.len();
        let (item_tx, mut item_rx) = mpsc::unbounded_channel::<(usize, Vec<NewsItem>)>();
        let (err_tx, mut err_rx) = mpsc::unbounded_channel::<NewsError>();
        let limiter = (self.options.max_concurrent > 0)
            .then(|| Arc::new(Semaphore::new(self.options.max_concurrent)));

        let mut tasks = JoinSet::new();
        for (index, item) in work.into_iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let retry = self.options.retry;
            let cancel = cancel.clone();
            let limiter = limiter.clone();
            let item_tx = item_tx.clone();
            let err_tx = err_tx.clone();

            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => match limiter.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            let _ = err_tx.send(NewsError::Task("fetch limiter closed".into()));
                            return;
                        }
                    },
                    None => None,
                };

                match fetch_and_normalize(fetcher.as_ref(), &retry, &cancel, &item).await {
                    Ok(items) => {
                        tracing::debug!(
                            provider = %item.provider,
                            feed = %item.url,
                            items = items.len(),
                            "Feed task finished"
                        );
                        let _ = item_tx.send((index, items));
                    }
                    Err(e) => {
                        let _ = err_tx.send(e);
                    }
                }
            });
        }
        drop(item_tx);
        drop(err_tx);

        let mut batches: Vec<Option<Vec<NewsItem>>> = vec![None; total];
        let mut remaining = total;

        while remaining > 0 {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(NewsError::Cancelled),
                Some(err) = err_rx.recv() => {
                    tracing::warn!(
                        error = %err,
                        pending = remaining,
                        "Feed task failed, abandoning request"
                    );
                    return Err(err);
                }
                Some((index, items)) = item_rx.recv() => {
                    batches[index] = Some(items);
                    remaining -= 1;
                }
                joined = tasks.join_next() => match joined {
                    Some(Err(e)) => return Err(NewsError::Task(e.to_string())),
                    Some(Ok(())) => {}
                    // Every task has exited; anything it sent is drained above
                    None => break,
                },
            }
        }

        if remaining > 0 {
            return Err(NewsError::Task(format!(
                "{remaining} feed task(s) exited without reporting"
            )));
        }

        Ok(batches.into_iter().flatten().flatten().collect())
    }
}

async fn fetch_and_normalize<F: FeedFetcher>(
    fetcher: &F,
    retry: &RetryPolicy,
    cancel: &CancelToken,
    work: &FeedWorkItem,
) -> Result<Vec<NewsItem>, NewsError> {
    let url = work.url.as_str();
    let feed = retry
        .run(cancel, move |attempt| {
            tracing::trace!(feed = %url, attempt = attempt, "Fetching feed");
            fetcher.fetch(cancel, url)
        })
        .await?;
    normalize(feed, work.provider)
}
