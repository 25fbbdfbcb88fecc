// src/metrics.rs
//! Metric descriptions for every pipeline stage.
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op. Embedders that want an exporter install
//! one before calling into the library.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up once a recorder exists).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        // ingest
        describe_counter!("ingest_items_parsed_total", "Items parsed from feeds.");
        describe_counter!("ingest_articles_total", "Articles kept after validation, age filter and title dedup.");
        describe_counter!("ingest_malformed_total", "Items skipped as malformed (URL or timestamp).");
        describe_counter!("ingest_stale_total", "Items older than the max-age window.");
        describe_counter!("ingest_title_dedup_total", "Cross-source duplicates removed by title.");
        describe_counter!("ingest_provider_errors_total", "Provider fetch/parse errors.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");

        // digest
        describe_counter!("digest_scored_total", "Articles passed to the relevance scorer.");
        describe_counter!("digest_failed_score_total", "Articles rejected by the scorer.");
        describe_counter!("digest_seen_before_total", "Relevant articles already delivered in an earlier run.");
        describe_counter!(
            "digest_in_batch_duplicates_total",
            "Relevant articles repeating a URL accepted earlier in the same run."
        );
        describe_counter!("digest_accepted_total", "Articles accepted into a digest (before the size cap).");
        describe_gauge!("digest_size", "Entries in the last assembled digest.");

        // delivery + store
        describe_counter!("notify_delivery_attempts_total", "Webhook POST attempts.");
        describe_counter!("notify_delivery_failures_total", "Digests whose delivery failed after retries.");
        describe_counter!("dedup_committed_total", "Dedup records newly inserted after delivery.");
        describe_counter!("dedup_commit_failures_total", "Post-delivery dedup commits that failed.");
        describe_counter!("dedup_pruned_total", "Dedup records removed by retention.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last completed a run.");
    });
}
