use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use thiserror::Error;

use super::parser::{parse_rss, RawFeed};
use super::retry::Retryable;
use crate::news::CancelToken;

/// Default per-request timeout for feed GETs.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);
/// Default cap on a feed response body.
pub const DEFAULT_MAX_FEED_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a single feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the client-side timeout
    #[error("Request timed out")]
    Timeout,
    /// HTTP 429 with a usable `Retry-After`; the server said when to come back
    #[error("Rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    /// Feed XML could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// The request context was cancelled
    #[error("Request cancelled")]
    Cancelled,
}

impl Retryable for FetchError {
    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(e) => e.is_timeout() || e.is_connect(),
            FetchError::HttpStatus(status) => *status >= 500,
            FetchError::Timeout | FetchError::IncompleteResponse { .. } => true,
            _ => false,
        }
    }

    fn cancelled() -> Self {
        FetchError::Cancelled
    }
}

/// Capability for retrieving and decoding one feed document.
///
/// The production implementation is [`HttpFetcher`]; tests substitute
/// stubs returning canned documents or errors.
pub trait FeedFetcher: Send + Sync + 'static {
    /// Fetches `url` once. Implementations must give up with
    /// [`FetchError::Cancelled`] as soon as `cancel` fires.
    fn fetch(
        &self,
        cancel: &CancelToken,
        url: &str,
    ) -> impl Future<Output = Result<RawFeed, FetchError>> + Send;
}

/// Fetches feeds over HTTP and decodes them as RSS.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_bytes: DEFAULT_MAX_FEED_BYTES,
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

    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(match retry_after(response.headers()) {
                Some(retry_after) => FetchError::RateLimited { retry_after },
                None => FetchError::HttpStatus(status.as_u16()),
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        read_limited_bytes(response, self.max_bytes).await
    }
}

impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, cancel: &CancelToken, url: &str) -> Result<RawFeed, FetchError> {
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.get(url)) => {
                result.map_err(|_| FetchError::Timeout)??
            }
        };

        let feed = parse_rss(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
        tracing::debug!(
            feed = %url,
            bytes = bytes.len(),
            items = feed.channel.items.len(),
            "Fetched feed"
        );
        Ok(feed)
    }
}

/// Reads `Retry-After` as a whole number of seconds.
///
/// HTTP-date values, non-numeric text and values of zero or less all mean
/// "do not retry" and yield `None`.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let secs: i64 = value.trim().parse().ok()?;
    u64::try_from(secs)
        .ok()
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
}

/// Streams a response body into memory, enforcing `limit` and checking the
/// received length against `Content-Length`.
pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
