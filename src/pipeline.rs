// src/pipeline.rs
//! One digest run (collect → assemble → deliver → commit → prune) and the
//! daily scheduler around it.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, Utc};
use metrics::{counter, gauge};
use std::path::PathBuf;

use crate::config::{KeywordConfig, SourcesConfig};
use crate::dedup::{DedupStats, DedupStore, SqliteDedupStore};
use crate::digest::{self, Digest};
use crate::error::{DigestError, Result};
use crate::ingest::{self, providers::build_providers, types::SourceProvider};
use crate::notify::{render_preview, NotifierMux};

pub const DEFAULT_DB_PATH: &str = "data/seen_articles.db";

/// Run-level knobs, usually filled from CLI flags and the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub max_age_hours: u32,
    pub max_items: usize,
    pub db_path: PathBuf,
    /// 0 disables pruning.
    pub retention_days: u32,
    pub teams_webhook: Option<String>,
    pub slack_webhook: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_age_hours: 48,
            max_items: 30,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            retention_days: 30,
            teams_webhook: None,
            slack_webhook: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    DryRun,
    Live,
}

#[derive(Debug)]
pub struct RunReport {
    pub mode: RunMode,
    pub digest: Digest,
    /// Articles dropped during collection (malformed + stale + title duplicates).
    pub collection_dropped: usize,
    pub provider_errors: usize,
    /// Set when a live delivery failed; nothing was committed.
    pub delivery_error: Option<String>,
    /// Newly inserted dedup keys; `None` when no commit happened.
    pub committed: Option<usize>,
    pub pruned: u64,
}

/// One cycle against already-built collaborators.
///
/// Dry runs assemble the same digest as a live run but neither deliver nor
/// commit. A live run with no delivery channel degrades to a dry run.
pub async fn run_cycle(
    settings: &RunSettings,
    keywords: &KeywordConfig,
    providers: &[Box<dyn SourceProvider>],
    store: &dyn DedupStore,
    notifier: &NotifierMux,
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    crate::metrics::ensure_described();

    let mode = if dry_run {
        RunMode::DryRun
    } else if notifier.is_empty() {
        tracing::warn!(
            target: "pipeline",
            "no TEAMS_WEBHOOK_URL or SLACK_WEBHOOK_URL configured; running as dry run"
        );
        RunMode::DryRun
    } else {
        RunMode::Live
    };
    tracing::info!(
        target: "pipeline",
        ?mode,
        max_age_hours = settings.max_age_hours,
        max_items = settings.max_items,
        providers = providers.len(),
        "run starting"
    );

    let collected = ingest::collect(providers, now, settings.max_age_hours).await;
    let collection_dropped =
        collected.malformed + collected.stale + collected.cross_source_duplicates;
    let provider_errors = collected.provider_errors;
    if collected.articles.is_empty() {
        tracing::warn!(target: "pipeline", "no articles collected from any source");
    }

    let digest = digest::assemble(collected.articles, keywords, store, settings.max_items, now).await?;

    let mut report = RunReport {
        mode,
        digest,
        collection_dropped,
        provider_errors,
        delivery_error: None,
        committed: None,
        pruned: 0,
    };

    if mode == RunMode::DryRun {
        tracing::info!(
            target: "pipeline",
            entries = report.digest.len(),
            "dry run complete; nothing delivered or marked as seen"
        );
        return Ok(report);
    }

    match notifier.deliver(&report.digest).await {
        Ok(()) => match store.record_batch(&report.digest.new_dedup_entries).await {
            Ok(n) => {
                counter!("dedup_committed_total").increment(n as u64);
                tracing::info!(target: "pipeline", committed = n, "articles marked as seen");
                report.committed = Some(n);
            }
            Err(e) => {
                // delivered but not remembered: the same articles may repeat next run
                counter!("dedup_commit_failures_total").increment(1);
                tracing::error!(
                    target: "pipeline",
                    error = %e,
                    records = report.digest.new_dedup_entries.len(),
                    "CRITICAL: digest delivered but dedup commit failed"
                );
            }
        },
        Err(e) => {
            tracing::error!(target: "pipeline", error = ?e, "delivery failed; nothing marked as seen");
            report.delivery_error = Some(format!("{e:#}"));
        }
    }

    if settings.retention_days > 0 {
        match store.prune_older_than(settings.retention_days, now).await {
            Ok(n) => {
                counter!("dedup_pruned_total").increment(n);
                if n > 0 {
                    tracing::info!(target: "pipeline", pruned = n, days = settings.retention_days, "retention prune");
                }
                report.pruned = n;
            }
            Err(e) => tracing::warn!(target: "pipeline", error = %e, "retention prune failed"),
        }
    }

    gauge!("pipeline_last_run_ts").set(now.timestamp() as f64);
    Ok(report)
}

/// Load configuration, open the store, run one cycle, print the preview for
/// dry runs. Config and store failures abort before anything is scored.
pub async fn run_once(settings: &RunSettings, dry_run: bool) -> Result<RunReport> {
    let keywords = KeywordConfig::load_default()?;
    let sources = SourcesConfig::load_default()?;
    let providers =
        build_providers(&sources).map_err(|e| DigestError::Config(format!("{e:#}")))?;
    let store = SqliteDedupStore::open(&settings.db_path).await?;
    let notifier = NotifierMux::from_webhooks(
        settings.teams_webhook.as_deref(),
        settings.slack_webhook.as_deref(),
    );

    let result = run_cycle(
        settings,
        &keywords,
        &providers,
        &store,
        &notifier,
        dry_run,
        Utc::now(),
    )
    .await;
    store.close().await;
    let report = result?;

    if report.mode == RunMode::DryRun {
        println!("{}", render_preview(&report.digest));
    }
    tracing::info!(
        target: "pipeline",
        shown = report.digest.len(),
        accepted = report.digest.counters.accepted,
        committed = ?report.committed,
        "run complete"
    );

    match &report.delivery_error {
        Some(e) => Err(DigestError::Delivery(e.clone())),
        None => Ok(report),
    }
}

/// Parse a daily run time such as "07:00".
pub fn parse_schedule_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| DigestError::Config(format!("invalid schedule time `{s}`, expected HH:MM")))
}

/// Next wall-clock occurrence of `at` strictly after `now`.
pub fn next_occurrence(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Run immediately, then every day at `at` (local time) until Ctrl-C.
/// Failed runs are logged; the loop keeps going.
pub async fn run_scheduled(settings: &RunSettings, at: NaiveTime, dry_run: bool) -> Result<()> {
    tracing::info!(target: "pipeline", at = %at.format("%H:%M"), "scheduling daily run (local time)");
    loop {
        match run_once(settings, dry_run).await {
            Ok(r) => tracing::info!(target: "pipeline", shown = r.digest.len(), "scheduled run finished"),
            Err(e) => tracing::error!(target: "pipeline", error = %e, fatal = e.is_fatal(), "scheduled run failed"),
        }

        let now = Local::now().naive_local();
        let next = next_occurrence(now, at);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(target: "pipeline", next = %next, "sleeping until next run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(target: "pipeline", "shutdown requested");
                return Ok(());
            }
        }
    }
}

/// Dedup store diagnostics for the `--stats` command.
pub async fn store_stats(settings: &RunSettings) -> Result<DedupStats> {
    let store = SqliteDedupStore::open(&settings.db_path).await?;
    let stats = store.stats().await;
    store.close().await;
    stats
}
