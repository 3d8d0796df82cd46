//! Single-feed retrieval: HTTP fetch, retry policy, RSS decoding and
//! normalization into news items.
//!
//! - [`fetcher`] - the [`FeedFetcher`] capability and its HTTP implementation
//! - [`retry`] - bounded retries honoring server `Retry-After` delays
//! - [`parser`] - event-based RSS 2.0 decoding with `quick-xml`
//! - [`normalize`] - raw items into [`NewsItem`](crate::news::NewsItem)s

pub mod fetcher;
pub mod normalize;
pub mod parser;
pub mod retry;

pub use fetcher::{FeedFetcher, FetchError, HttpFetcher};
pub use normalize::normalize;
pub use parser::{parse_rss, Channel, FeedParseError, Guid, Image, RawFeed, RawItem};
pub use retry::{RetryPolicy, Retryable};
