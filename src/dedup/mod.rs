// src/dedup/mod.rs
//! Persistent record of delivered articles, keyed by normalized URL.
//!
//! Callers normalize keys (`ingest::normalize_url`) before every read or write;
//! the store never re-normalizes. Records are insert-only apart from
//! retention pruning.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use memory::MemoryDedupStore;
pub use sqlite::SqliteDedupStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub url_key: String,
    pub first_seen_at: DateTime<Utc>,
    pub source_id: String,
    /// Diagnostics only.
    pub title: Option<String>,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub total_records: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub recorded_last_24h: u64,
}

#[async_trait::async_trait]
pub trait DedupStore: Send + Sync {
    /// True if `url_key` was committed by any earlier `record_batch`.
    async fn exists(&self, url_key: &str) -> Result<bool>;

    /// Commit all records atomically. Keys already stored, or repeated within
    /// the batch, are skipped. Returns how many keys were newly inserted.
    async fn record_batch(&self, records: &[DedupRecord]) -> Result<usize>;

    async fn stats(&self) -> Result<DedupStats>;

    /// Retention maintenance: delete records first seen before `now - days`.
    async fn prune_older_than(&self, days: u32, now: DateTime<Utc>) -> Result<u64>;
}

/// First occurrence of each key wins; later duplicates in the same batch are dropped.
pub(crate) fn unique_by_key(records: &[DedupRecord]) -> Vec<&DedupRecord> {
    let mut seen = std::collections::HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.url_key.as_str()))
        .collect()
}
