// src/digest.rs
//! Digest assembler: score → drop failures → drop already-seen → rank → cap.
//!
//! Assembly never writes to the store. The caller commits
//! `Digest::new_dedup_entries` once delivery has succeeded.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::keywords::KeywordConfig;
use crate::dedup::{DedupRecord, DedupStore};
use crate::error::Result;
use crate::ingest::normalize_url;
use crate::ingest::types::Article;
use crate::relevance::{self, ScoreResult};

/// One accepted article with its evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestEntry {
    pub article: Article,
    pub score: ScoreResult,
    pub url_key: String,
}

/// Per-stage counts of one assembly pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DigestCounters {
    pub input: usize,
    pub malformed_url: usize,
    pub failed_score: usize,
    pub seen_before: usize,
    pub in_batch_duplicates: usize,
    pub accepted: usize,
    /// Accepted but cut by `max_items`.
    pub truncated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Digest {
    pub generated_at: DateTime<Utc>,
    /// Ranked, at most `max_items` long.
    pub entries: Vec<DigestEntry>,
    /// One record per accepted article, including the ones cut by `max_items`.
    pub new_dedup_entries: Vec<DedupRecord>,
    pub counters: DigestCounters,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Confidence desc, then newest first (undated last), then url_key asc.
pub fn rank_order(a: &DigestEntry, b: &DigestEntry) -> Ordering {
    b.score
        .confidence
        .total_cmp(&a.score.confidence)
        .then_with(|| b.article.published_at.cmp(&a.article.published_at))
        .then_with(|| a.url_key.cmp(&b.url_key))
}

/// Build the digest for one run. Store errors are fatal; a bad article URL
/// only skips that article. When one URL shows up more than once in the batch,
/// the copy with the highest confidence is kept (earliest on a tie).
pub async fn assemble(
    raw_articles: Vec<Article>,
    cfg: &KeywordConfig,
    store: &dyn DedupStore,
    max_items: usize,
    now: DateTime<Utc>,
) -> Result<Digest> {
    crate::metrics::ensure_described();

    let mut counters = DigestCounters {
        input: raw_articles.len(),
        ..Default::default()
    };
    let mut slot_of: HashMap<String, usize> = HashMap::new();
    let mut accepted: Vec<DigestEntry> = Vec::new();

    for article in raw_articles {
        // 1) identity
        let url_key = match normalize_url(&article.url) {
            Ok(k) => k,
            Err(e) => {
                tracing::warn!(target: "digest", source = %article.source_id, error = %e, "skipping article");
                counters.malformed_url += 1;
                continue;
            }
        };

        // 2) relevance
        let score = relevance::score(&article, cfg);
        if !score.passed {
            tracing::debug!(
                target: "digest",
                %url_key,
                reason = %score.reason,
                confidence = score.confidence,
                "not relevant"
            );
            counters.failed_score += 1;
            continue;
        }

        // 3) seen in this run or an earlier one
        if let Some(&slot) = slot_of.get(&url_key) {
            tracing::debug!(target: "digest", %url_key, source = %article.source_id, "duplicate in batch");
            counters.in_batch_duplicates += 1;
            if score.confidence > accepted[slot].score.confidence {
                accepted[slot] = DigestEntry {
                    article,
                    score,
                    url_key,
                };
            }
            continue;
        }
        if store.exists(&url_key).await? {
            tracing::debug!(target: "digest", %url_key, "already delivered");
            counters.seen_before += 1;
            continue;
        }

        slot_of.insert(url_key.clone(), accepted.len());
        accepted.push(DigestEntry {
            article,
            score,
            url_key,
        });
    }

    // 4) rank
    accepted.sort_by(rank_order);
    counters.accepted = accepted.len();

    // 5) remember everything accepted, show only the top `max_items`
    let new_dedup_entries: Vec<DedupRecord> = accepted
        .iter()
        .map(|e| DedupRecord {
            url_key: e.url_key.clone(),
            first_seen_at: now,
            source_id: e.article.source_id.clone(),
            title: Some(e.article.title.clone()),
            confidence: Some(e.score.confidence),
        })
        .collect();
    if accepted.len() > max_items {
        counters.truncated = accepted.len() - max_items;
        accepted.truncate(max_items);
    }

    counter!("digest_scored_total").increment((counters.input - counters.malformed_url) as u64);
    counter!("digest_failed_score_total").increment(counters.failed_score as u64);
    counter!("digest_seen_before_total").increment(counters.seen_before as u64);
    counter!("digest_in_batch_duplicates_total").increment(counters.in_batch_duplicates as u64);
    counter!("digest_accepted_total").increment(counters.accepted as u64);
    gauge!("digest_size").set(accepted.len() as f64);

    tracing::info!(
        target: "digest",
        input = counters.input,
        malformed_url = counters.malformed_url,
        failed_score = counters.failed_score,
        seen_before = counters.seen_before,
        in_batch_duplicates = counters.in_batch_duplicates,
        accepted = counters.accepted,
        shown = accepted.len(),
        truncated = counters.truncated,
        "digest assembled"
    );

    Ok(Digest {
        generated_at: now,
        entries: accepted,
        new_dedup_entries,
        counters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::MemoryDedupStore;
    use crate::ingest::types::{FeedSource, TrustTier};
    use chrono::{Duration as ChronoDuration, TimeZone};

    const KW: &str = r#"
primary_keywords = ["defence procurement", "NORAD", "Arctic sovereignty"]
context_keywords = ["military", "Canadian Armed Forces", "navy"]
negative_keywords = ["hockey"]

[thresholds]
trusted = 0.3
general = 0.7
"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 14, 12, 0, 0).unwrap()
    }

    fn src(id: &str, tier: TrustTier) -> FeedSource {
        FeedSource {
            id: id.into(),
            name: id.into(),
            category: "news".into(),
            tier,
        }
    }

    fn art(id: &str, url: &str, title: &str, hours_ago: Option<i64>) -> Article {
        Article::new(
            &src(id, TrustTier::Trusted),
            url,
            title,
            "",
            hours_ago.map(|h| now() - ChronoDuration::hours(h)),
        )
    }

    #[tokio::test]
    async fn ranks_by_confidence_then_recency() {
        let cfg = KeywordConfig::from_toml_str(KW).unwrap();
        let store = MemoryDedupStore::new();
        let input = vec![
            art("a", "https://a.ca/1", "NORAD update", Some(5)),
            art("a", "https://a.ca/2", "NORAD and Arctic sovereignty", Some(10)),
            art("a", "https://a.ca/3", "NORAD update two", Some(1)),
            art("a", "https://a.ca/4", "NORAD undated", None),
            art("a", "https://a.ca/5", "Weather tomorrow", Some(1)),
        ];
        let d = assemble(input, &cfg, &store, 10, now()).await.unwrap();
        let keys: Vec<_> = d.entries.iter().map(|e| e.url_key.as_str()).collect();
        assert_eq!(keys, vec!["a.ca/2", "a.ca/3", "a.ca/1", "a.ca/4"]);
        assert_eq!(d.counters.failed_score, 1);
        assert_eq!(d.new_dedup_entries.len(), 4);
    }

    #[tokio::test]
    async fn truncated_articles_are_still_recorded() {
        let cfg = KeywordConfig::from_toml_str(KW).unwrap();
        let store = MemoryDedupStore::new();
        let input = (0..5)
            .map(|i| art("a", &format!("https://a.ca/{i}"), "NORAD", Some(i)))
            .collect();
        let d = assemble(input, &cfg, &store, 2, now()).await.unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d.counters.truncated, 3);
        assert_eq!(d.new_dedup_entries.len(), 5);
        assert!(d.new_dedup_entries.iter().all(|r| r.first_seen_at == now()));
    }

    #[tokio::test]
    async fn skips_seen_and_cross_source_duplicates() {
        let cfg = KeywordConfig::from_toml_str(KW).unwrap();
        let store = MemoryDedupStore::new();
        store
            .record_batch(&[DedupRecord {
                url_key: "a.ca/old".into(),
                first_seen_at: now(),
                source_id: "a".into(),
                title: None,
                confidence: None,
            }])
            .await
            .unwrap();
        let input = vec![
            art("a", "https://a.ca/old", "NORAD", Some(1)),
            art("a", "https://a.ca/new?utm_source=x", "NORAD", Some(1)),
            art("b", "http://A.ca/new/", "NORAD", Some(2)),
            art("c", "not a url", "NORAD", Some(1)),
        ];
        let d = assemble(input, &cfg, &store, 10, now()).await.unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d.entries[0].article.source_id, "a");
        assert_eq!(d.counters.seen_before, 1);
        assert_eq!(d.counters.in_batch_duplicates, 1);
        assert_eq!(d.counters.malformed_url, 1);
        // assembly is read-only
        assert!(!store.exists("a.ca/new").await.unwrap());
    }

    #[tokio::test]
    async fn repeated_url_keeps_best_scored_copy() {
        let cfg = KeywordConfig::from_toml_str(KW).unwrap();
        let store = MemoryDedupStore::new();
        let input = vec![
            art("a", "https://a.ca/story", "NORAD", Some(1)),
            art("b", "https://a.ca/story?utm_medium=rss", "NORAD and Arctic sovereignty", Some(1)),
            art("c", "https://a.ca/story", "NORAD again", Some(1)),
        ];
        let d = assemble(input, &cfg, &store, 10, now()).await.unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d.entries[0].article.source_id, "b");
        assert_eq!(d.entries[0].score.confidence, 1.0);
        assert_eq!(d.counters.in_batch_duplicates, 2);
        assert_eq!(d.new_dedup_entries.len(), 1);
        assert_eq!(d.new_dedup_entries[0].source_id, "b");
    }

    #[tokio::test]
    async fn empty_input_gives_empty_digest() {
        let cfg = KeywordConfig::from_toml_str(KW).unwrap();
        let store = MemoryDedupStore::new();
        let d = assemble(Vec::new(), &cfg, &store, 10, now()).await.unwrap();
        assert!(d.is_empty());
        assert!(d.new_dedup_entries.is_empty());
    }
}
