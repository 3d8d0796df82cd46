//! News aggregation from multiple RSS providers into one sorted list, plus
//! single-article scraping, with an optional response cache.

pub mod config;
pub mod content;
pub mod feed;
pub mod news;
pub mod storage;
pub mod util;
