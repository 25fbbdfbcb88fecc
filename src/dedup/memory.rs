// src/dedup/memory.rs
//! In-process store with the same semantics as the SQLite one. Not persisted.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{unique_by_key, DedupRecord, DedupStats, DedupStore};
use crate::error::{DigestError, Result};

#[derive(Debug, Default)]
pub struct MemoryDedupStore {
    inner: Mutex<BTreeMap<String, DedupRecord>>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, DedupRecord>>> {
        self.inner
            .lock()
            .map_err(|_| DigestError::PersistenceUnavailable("memory store mutex poisoned".into()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl DedupStore for MemoryDedupStore {
    async fn exists(&self, url_key: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(url_key))
    }

    async fn record_batch(&self, records: &[DedupRecord]) -> Result<usize> {
        let mut map = self.lock()?;
        let mut inserted = 0usize;
        for r in unique_by_key(records) {
            if !map.contains_key(&r.url_key) {
                map.insert(r.url_key.clone(), r.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn stats(&self) -> Result<DedupStats> {
        let map = self.lock()?;
        let cutoff = Utc::now() - ChronoDuration::hours(24);
        Ok(DedupStats {
            total_records: map.len() as u64,
            oldest: map.values().map(|r| r.first_seen_at).min(),
            newest: map.values().map(|r| r.first_seen_at).max(),
            recorded_last_24h: map.values().filter(|r| r.first_seen_at > cutoff).count() as u64,
        })
    }

    async fn prune_older_than(&self, days: u32, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - ChronoDuration::days(i64::from(days));
        let mut map = self.lock()?;
        let before = map.len();
        map.retain(|_, r| r.first_seen_at >= cutoff);
        Ok((before - map.len()) as u64)
    }
}
