use std::time::Duration;

use anyhow::Result;

use super::schema::Database;
use super::types::{CacheStats, CachedResponse};

/// Longest TTL stored; SQLite `datetime` yields NULL past year 9999.
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

impl Database {
    // ========================================================================
    // Response Cache Operations
    // ========================================================================

    /// Stores `body` under `key`, replacing any previous entry.
    ///
    /// The entry expires `ttl` from now, at whole-second granularity. A zero
    /// TTL stores an entry that is already expired. TTLs beyond a century
    /// are clamped.
    pub async fn cache_response(&self, key: &str, body: &str, ttl: Duration) -> Result<()> {
        let ttl_modifier = format!("+{} seconds", ttl.as_secs().min(MAX_TTL_SECS));
        let size_bytes = body.len() as i64;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO response_cache
                (key, body, stored_at, expires_at, size_bytes)
            VALUES (?, ?, datetime('now'), datetime('now', ?), ?)
        "#,
        )
        .bind(key)
        .bind(body)
        .bind(&ttl_modifier)
        .bind(size_bytes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns the entry for `key` unless it is missing or expired.
    pub async fn get_cached_response(&self, key: &str) -> Result<Option<CachedResponse>> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT key, body, stored_at, expires_at
            FROM response_cache
            WHERE key = ? AND expires_at > datetime('now')
        "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(key, body, stored_at, expires_at)| CachedResponse {
            key,
            body,
            stored_at,
            expires_at,
        }))
    }

    /// Deletes every expired entry, returning how many were removed.
    pub async fn evict_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM response_cache WHERE expires_at <= datetime('now')")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Entry counts, total body size and the stored_at range.
    pub async fn cache_stats(&self) -> Result<CacheStats> {
        let row: (i64, i64, Option<i64>, Option<String>, Option<String>) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(CASE WHEN expires_at <= datetime('now') THEN 1 END),
                SUM(size_bytes),
                MIN(stored_at),
                MAX(stored_at)
            FROM response_cache
        "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CacheStats {
            total_entries: row.0,
            expired_entries: row.1,
            total_size_bytes: row.2.unwrap_or(0),
            oldest_entry: row.3,
            newest_entry: row.4,
        })
    }
}
