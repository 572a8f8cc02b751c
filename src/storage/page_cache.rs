use anyhow::Result;
use async_trait::async_trait;

use super::cache::ResponseCache;
use super::schema::Database;
use super::types::CacheStats;
use crate::domain::{Item, Page, RequestKey};

impl Database {
    // ========================================================================
    // Page Cache Operations
    // ========================================================================

    /// Store a page under its request key with the configured TTL.
    ///
    /// Replaces any existing row for the same key.
    pub async fn cache_page(&self, key: &RequestKey, page: &Page) -> Result<()> {
        let body = serde_json::to_string(&page.items)?;
        let size_bytes = body.len() as i64;
        let ttl_modifier = format!("+{} hours", self.cache_ttl_hours);

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO page_cache
                (category, query, page, total_pages, body, fetched_at, expires_at, size_bytes)
            VALUES (?, ?, ?, ?, ?, datetime('now'), datetime('now', ?), ?)
        "#,
        )
        .bind(key.category.as_str())
        .bind(&key.query)
        .bind(i64::from(key.page))
        .bind(i64::from(page.total_pages))
        .bind(&body)
        .bind(&ttl_modifier)
        .bind(size_bytes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Retrieve a cached page if it has not expired.
    pub async fn get_cached_page(&self, key: &RequestKey) -> Result<Option<Page>> {
        let row: Option<(i64, String)> = sqlx::query_as(
            r#"
            SELECT total_pages, body
            FROM page_cache
            WHERE category = ? AND query = ? AND page = ? AND expires_at > datetime('now')
        "#,
        )
        .bind(key.category.as_str())
        .bind(&key.query)
        .bind(i64::from(key.page))
        .fetch_optional(&self.pool)
        .await?;

        let Some((total_pages, body)) = row else {
            return Ok(None);
        };
        let items: Vec<Item> = serde_json::from_str(&body)?;
        Ok(Some(Page::new(
            key.page,
            u32::try_from(total_pages).unwrap_or(0),
            items,
        )))
    }

    /// Delete all expired cache entries.
    ///
    /// Returns the number of entries evicted.
    pub async fn evict_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM page_cache WHERE expires_at <= datetime('now')")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete every cached page.
    pub async fn clear_page_cache(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM page_cache")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Compute aggregate cache statistics.
    pub async fn cache_stats(&self) -> Result<CacheStats> {
        let row: (i64, Option<i64>, Option<i64>, Option<String>, Option<String>) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   SUM(CASE WHEN expires_at <= datetime('now') THEN 1 ELSE 0 END),
                   SUM(size_bytes),
                   MIN(fetched_at),
                   MAX(fetched_at)
            FROM page_cache
        "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CacheStats {
            total_entries: row.0,
            expired_entries: row.1.unwrap_or(0),
            total_size_bytes: row.2.unwrap_or(0),
            oldest_entry: row.3,
            newest_entry: row.4,
        })
    }
}

#[async_trait]
impl ResponseCache for Database {
    async fn read(&self, key: &RequestKey) -> Option<Page> {
        match self.get_cached_page(key).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Page cache read failed, treating as miss");
                None
            }
        }
    }

    async fn write(&self, key: &RequestKey, page: &Page) {
        if let Err(e) = self.cache_page(key, page).await {
            tracing::warn!(key = %key, error = %e, "Failed to cache page");
        }
    }
}
