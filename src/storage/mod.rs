//! Response caching backends.
//!
//! [`ResponseCache`] is the capability the news service reads through. It is
//! implemented by the SQLite [`Database`], the in-process [`MemoryCache`] and
//! the no-op [`NoCache`].

mod memory;
mod response_cache;
mod schema;
mod types;

use std::future::Future;
use std::time::Duration;

use anyhow::Result;

pub use memory::MemoryCache;
pub use schema::Database;
pub use types::{CacheStats, CachedResponse, DatabaseError};

/// Key/value store for serialized responses with per-entry expiry.
pub trait ResponseCache: Send + Sync + 'static {
    /// Returns the live body stored under `key`, if any.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Stores `body` under `key` for `ttl`.
    fn put(&self, key: &str, body: &str, ttl: Duration) -> impl Future<Output = Result<()>> + Send;
}

impl ResponseCache for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_cached_response(key).await?.map(|cached| cached.body))
    }

    async fn put(&self, key: &str, body: &str, ttl: Duration) -> Result<()> {
        self.cache_response(key, body, ttl).await
    }
}

/// Cache that stores nothing; every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl ResponseCache for NoCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _body: &str, _ttl: Duration) -> Result<()> {
        Ok(())
    }
}
