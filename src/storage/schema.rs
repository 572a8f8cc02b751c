use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

/// Default TTL for cached pages (24 hours)
pub const DEFAULT_CACHE_TTL_HOURS: i64 = 24;

/// Default number of recent queries retained
pub const DEFAULT_RECENT_QUERIES_LIMIT: u32 = 10;

// ============================================================================
// Database
// ============================================================================

/// SQLite-backed page cache and recent-query store.
///
/// Cloning is cheap; all clones share one connection pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
    pub(crate) cache_ttl_hours: i64,
    pub(crate) recent_limit: u32,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process holds the
    /// database lock (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // Create the file with user-only permissions before the pool touches it
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::PermissionsExt;
            let db_path = std::path::Path::new(path);
            if db_path.exists() {
                let perms = std::fs::Permissions::from_mode(0o600);
                if let Err(e) = std::fs::set_permissions(path, perms) {
                    tracing::warn!(path = %path, error = %e, "Failed to set database file permissions");
                }
            } else if let Some(parent) = db_path.parent() {
                if parent.exists() {
                    use std::os::unix::fs::OpenOptionsExt;
                    let _file = std::fs::OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .mode(0o600)
                        .open(db_path)
                        .ok(); // If creation fails, SQLite will report the error at connect_with.
                }
            }
        }

        // busy_timeout=5000: wait up to 5 seconds for locks before SQLITE_BUSY.
        // Cache writes are fire-and-forget and may overlap with reads.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self {
            pool,
            cache_ttl_hours: DEFAULT_CACHE_TTL_HOURS,
            recent_limit: DEFAULT_RECENT_QUERIES_LIMIT,
        };
        db.migrate().await.map_err(|e| {
            let error_string = e.to_string().to_lowercase();
            if error_string.contains("database is locked")
                || error_string.contains("database table is locked")
                || error_string.contains("sqlite_busy")
                || error_string.contains("sqlite_locked")
            {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        Ok(db)
    }

    /// Set how long written pages stay readable. Clamped to at least one hour.
    pub fn with_cache_ttl_hours(mut self, hours: i64) -> Self {
        self.cache_ttl_hours = hours.max(1);
        self
    }

    /// Set how many recent queries are retained. Clamped to at least one.
    pub fn with_recent_limit(mut self, limit: u32) -> Self {
        self.recent_limit = limit.max(1);
        self
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<()> {
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;

        // One row per RequestKey; `query` is empty for fixed categories
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS page_cache (
                category TEXT NOT NULL,
                query TEXT NOT NULL,
                page INTEGER NOT NULL,
                total_pages INTEGER NOT NULL,
                body TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                PRIMARY KEY (category, query, page)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_page_cache_expires ON page_cache(expires_at)")
            .execute(&mut *tx)
            .await?;

        // `query` holds the normalized text; `display` keeps what the user typed
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recent_queries (
                query TEXT PRIMARY KEY,
                display TEXT NOT NULL,
                seq INTEGER NOT NULL,
                saved_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_recent_queries_seq ON recent_queries(seq DESC)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_and_migrate_twice() {
        let db = Database::open(":memory:").await.unwrap();
        // Idempotent
        db.migrate().await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&db.pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert!(names.contains(&"page_cache"));
        assert!(names.contains(&"recent_queries"));
    }

    #[tokio::test]
    async fn test_builder_clamps() {
        let db = Database::open(":memory:")
            .await
            .unwrap()
            .with_cache_ttl_hours(0)
            .with_recent_limit(0);
        assert_eq!(db.cache_ttl_hours, 1);
        assert_eq!(db.recent_limit, 1);
    }
}
