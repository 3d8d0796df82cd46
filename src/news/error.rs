use std::time::Duration;
use thiserror::Error;

use crate::feed::FetchError;

/// Errors surfaced by news aggregation and article enrichment.
///
/// Every failure a caller can observe is one of these variants. The
/// fetcher's retriable rate-limit condition is consumed by the retry policy
/// and never appears here; once retries run out it is reported as
/// [`NewsError::Transport`].
#[derive(Debug, Error)]
pub enum NewsError {
    /// The request itself is invalid (bad provider, category, sort or URL,
    /// or mutually exclusive fields). Detected before any network activity.
    #[error("invalid argument: {0}")]
    Argument(String),
    /// Network failure, timeout, or a non-success HTTP response.
    #[error("transport error: {0}")]
    Transport(String),
    /// Malformed feed XML or an unparseable publish date.
    #[error("parse error: {0}")]
    Parse(String),
    /// The request context was cancelled by the caller.
    #[error("request cancelled")]
    Cancelled,
    /// The aggregation exceeded its configured deadline.
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// A worker task ended without reporting a result (panic or abort).
    #[error("fetch task failed: {0}")]
    Task(String),
}

impl NewsError {
    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        NewsError::Argument(msg.into())
    }

    /// True for client-fault errors that must never be retried.
    pub fn is_argument(&self) -> bool {
        matches!(self, NewsError::Argument(_))
    }
}

impl From<FetchError> for NewsError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Parse(msg) => NewsError::Parse(msg),
            FetchError::Cancelled => NewsError::Cancelled,
            FetchError::RateLimited { .. } => {
                NewsError::Transport(format!("HTTP error: status {}", 429))
            }
            other => NewsError::Transport(other.to_string()),
        }
    }
}
