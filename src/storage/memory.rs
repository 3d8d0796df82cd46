use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use lru::LruCache;
use tokio::time::Instant;

use super::ResponseCache;

struct Entry {
    body: String,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| at > Instant::now())
    }
}

/// Bounded in-process cache; the least recently used entry is evicted when
/// full and expired entries are dropped on lookup.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory cache lock poisoned"))?;

        match entries.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(entry.body.clone())),
            Some(_) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn store(&self, key: &str, body: &str, ttl: Duration) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory cache lock poisoned"))?;
        entries.put(
            key.to_string(),
            Entry {
                body: body.to_string(),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }
}

impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.lookup(key)
    }

    async fn put(&self, key: &str, body: &str, ttl: Duration) -> Result<()> {
        self.store(key, body, ttl)
    }
}
