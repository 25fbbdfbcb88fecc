// src/dedup/sqlite.rs
//! File-backed dedup store. One table, one row per delivered URL key.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use super::{unique_by_key, DedupRecord, DedupStats, DedupStore};
use crate::error::{DigestError, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS seen_articles (
    url_key       TEXT PRIMARY KEY,
    first_seen_at INTEGER NOT NULL,
    source_id     TEXT NOT NULL,
    title         TEXT,
    confidence    REAL
);
CREATE INDEX IF NOT EXISTS idx_seen_articles_first_seen ON seen_articles(first_seen_at);
"#;

#[derive(Debug, Clone)]
pub struct SqliteDedupStore {
    pool: SqlitePool,
}

fn unavailable(ctx: &str, e: impl std::fmt::Display) -> DigestError {
    DigestError::PersistenceUnavailable(format!("{ctx}: {e}"))
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}

impl SqliteDedupStore {
    /// Open (creating if missing) the database at `path` and ensure the schema.
    /// Any failure here is fatal for the run.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| unavailable(&format!("create {}", parent.display()), e))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| unavailable(&format!("open {}", path.display()), e))?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::info!(target: "dedup", path = %path.display(), "dedup store opened");
        Ok(store)
    }

    /// Private in-memory database; a single connection so every query sees the same data.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| unavailable("open in-memory", e))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| unavailable("open in-memory", e))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        for stmt in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| unavailable("create schema", e))?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl DedupStore for SqliteDedupStore {
    async fn exists(&self, url_key: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM seen_articles WHERE url_key = ?")
            .bind(url_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn record_batch(&self, records: &[DedupRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;
        for r in unique_by_key(records) {
            let res = sqlx::query(
                "INSERT OR IGNORE INTO seen_articles (url_key, first_seen_at, source_id, title, confidence) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&r.url_key)
            .bind(r.first_seen_at.timestamp())
            .bind(&r.source_id)
            .bind(r.title.as_deref())
            .bind(r.confidence.map(f64::from))
            .execute(&mut *tx)
            .await?;
            inserted += res.rows_affected() as usize;
        }
        tx.commit().await?;
        tracing::debug!(target: "dedup", batch = records.len(), inserted, "batch committed");
        Ok(inserted)
    }

    async fn stats(&self) -> Result<DedupStats> {
        let (total, oldest, newest): (i64, Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), MIN(first_seen_at), MAX(first_seen_at) FROM seen_articles",
        )
        .fetch_one(&self.pool)
        .await?;

        let cutoff = (Utc::now() - ChronoDuration::hours(24)).timestamp();
        let (recent,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM seen_articles WHERE first_seen_at > ?")
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await?;

        Ok(DedupStats {
            total_records: total.max(0) as u64,
            oldest: oldest.and_then(from_unix),
            newest: newest.and_then(from_unix),
            recorded_last_24h: recent.max(0) as u64,
        })
    }

    async fn prune_older_than(&self, days: u32, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = (now - ChronoDuration::days(i64::from(days))).timestamp();
        let res = sqlx::query("DELETE FROM seen_articles WHERE first_seen_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rec(key: &str, at: DateTime<Utc>) -> DedupRecord {
        DedupRecord {
            url_key: key.into(),
            first_seen_at: at,
            source_id: "dnd-news".into(),
            title: Some("Arctic patrol ships".into()),
            confidence: Some(0.7),
        }
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("seen.db");
        let t = Utc.with_ymd_and_hms(2025, 10, 14, 9, 0, 0).unwrap();

        let store = SqliteDedupStore::open(&path).await.unwrap();
        let n = store
            .record_batch(&[rec("canada.ca/a", t), rec("canada.ca/a", t), rec("cbc.ca/b", t)])
            .await
            .unwrap();
        assert_eq!(n, 2);
        store.close().await;

        let reopened = SqliteDedupStore::open(&path).await.unwrap();
        assert!(reopened.exists("canada.ca/a").await.unwrap());
        assert!(reopened.exists("cbc.ca/b").await.unwrap());
        assert!(!reopened.exists("cbc.ca/c").await.unwrap());
        assert_eq!(reopened.record_batch(&[rec("cbc.ca/b", t)]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stats_and_prune() {
        let store = SqliteDedupStore::open_in_memory().await.unwrap();
        let empty = store.stats().await.unwrap();
        assert_eq!(empty, DedupStats::default());

        let now = Utc.with_ymd_and_hms(2025, 10, 14, 9, 0, 0).unwrap();
        store
            .record_batch(&[
                rec("old", now - ChronoDuration::days(45)),
                rec("mid", now - ChronoDuration::days(10)),
            ])
            .await
            .unwrap();
        let s = store.stats().await.unwrap();
        assert_eq!(s.total_records, 2);
        assert_eq!(s.oldest, Some(now - ChronoDuration::days(45)));
        assert_eq!(s.newest, Some(now - ChronoDuration::days(10)));

        assert_eq!(store.prune_older_than(30, now).await.unwrap(), 1);
        assert!(!store.exists("old").await.unwrap());
        assert!(store.exists("mid").await.unwrap());
    }

    #[tokio::test]
    async fn unopenable_path_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file standing where the parent directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let err = SqliteDedupStore::open(&blocker.join("seen.db")).await.unwrap_err();
        assert!(matches!(err, DigestError::PersistenceUnavailable(_)));
    }
}
