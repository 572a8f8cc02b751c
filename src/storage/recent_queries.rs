use anyhow::Result;
use async_trait::async_trait;

use super::schema::Database;
use crate::domain::Query;

/// Store of recently successful queries.
///
/// Callers treat saving as fire-and-forget; errors are for logging only.
#[async_trait]
pub trait RecentQueries: Send + Sync {
    async fn save_recent_query(&self, query: &Query) -> Result<()>;
}

impl Database {
    // ========================================================================
    // Recent Query Operations
    // ========================================================================

    /// Most recently saved queries, newest first.
    pub async fn recent_queries(&self, limit: u32) -> Result<Vec<Query>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT display
            FROM recent_queries
            ORDER BY seq DESC
            LIMIT ?
        "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(display,)| Query::new(display)).collect())
    }

    /// Remove every saved query.
    pub async fn clear_recent_queries(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM recent_queries")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RecentQueries for Database {
    /// Record `query` as the most recent one.
    ///
    /// An equal (normalized) query moves to the front instead of being
    /// duplicated, and the list is trimmed to the configured limit.
    /// Empty queries from fixed-category loads are skipped.
    async fn save_recent_query(&self, query: &Query) -> Result<()> {
        if query.is_empty() {
            tracing::trace!("Skipping empty recent query");
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO recent_queries (query, display, seq, saved_at)
            VALUES (?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM recent_queries), datetime('now'))
            ON CONFLICT(query) DO UPDATE SET
                display = excluded.display,
                seq = excluded.seq,
                saved_at = excluded.saved_at
        "#,
        )
        .bind(query.normalized())
        .bind(query.as_str().trim())
        .execute(&mut *tx)
        .await?;

        let trimmed = sqlx::query(
            r#"
            DELETE FROM recent_queries
            WHERE query NOT IN (
                SELECT query FROM recent_queries ORDER BY seq DESC LIMIT ?
            )
        "#,
        )
        .bind(i64::from(self.recent_limit))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        tracing::debug!(query = %query, trimmed, "Saved recent query");
        Ok(())
    }
}
