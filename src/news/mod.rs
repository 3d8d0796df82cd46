//! News aggregation core: request validation, the concurrent aggregator,
//! sorting, and the caching service in front of them.

pub mod aggregator;
pub mod cancel;
pub mod error;
pub mod request;
pub mod service;
pub mod sort;
pub mod time;
pub mod types;

pub use aggregator::{Aggregator, AggregatorOptions};
pub use cancel::{CancelHandle, CancelToken};
pub use error::NewsError;
pub use request::{FeedSelection, FeedTable, ListNewsParams, ListNewsRequest};
pub use service::NewsService;
pub use sort::sort_by_publish_date;
pub use time::parse_publish_date;
pub use types::{
    Article, Category, FeedWorkItem, ListNewsResponse, NewsItem, Provider, SortDirection,
};
