// src/ingest/mod.rs
pub mod providers;
pub mod types;
pub mod url_key;

use crate::error::{DigestError, Result};
use crate::ingest::types::{Article, FeedSource, RawItem, SourceProvider, TrustTier};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

pub use url_key::normalize_url;

/// Summaries longer than this are cut (chars, not bytes).
pub const SUMMARY_MAX_CHARS: usize = 500;

/// Cross-source title dedup compares this many normalized chars...
const TITLE_PREFIX_CHARS: usize = 60;
/// ...and only for titles longer than this.
const TITLE_MIN_CHARS: usize = 20;

/// Normalize feed text: decode entities, strip tags, unify quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags (replace with a space so adjacent words stay apart)
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

fn truncate_chars(s: String, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s
    }
}

/// Parse a feed timestamp (RFC 2822 for RSS, RFC 3339 for Atom).
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    match OffsetDateTime::parse(raw, &Rfc2822).or_else(|_| OffsetDateTime::parse(raw, &Rfc3339)) {
        Ok(odt) => DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), odt.nanosecond()),
        // chrono accepts a few legacy zone names ("EST", "PDT") that real feeds still emit
        Err(_) => DateTime::parse_from_rfc2822(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

/// Turn a parsed feed entry into an `Article`.
///
/// Missing link or a present-but-unparseable timestamp is `MalformedArticle`.
/// A missing timestamp is fine and yields `published_at = None`.
pub fn article_from_item(source: &FeedSource, item: RawItem) -> Result<Article> {
    let url = item.link.as_deref().map(str::trim).unwrap_or_default();
    if url.is_empty() {
        return Err(DigestError::MalformedArticle(format!(
            "entry without link from `{}`",
            source.id
        )));
    }

    let published_at = match item.published.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_published(raw).ok_or_else(|| {
            DigestError::MalformedArticle(format!("unparseable timestamp `{raw}` at {url}"))
        })?),
    };

    let title = normalize_text(item.title.as_deref().unwrap_or_default());
    let summary = truncate_chars(
        normalize_text(item.summary.as_deref().unwrap_or_default()),
        SUMMARY_MAX_CHARS,
    );

    Ok(Article::new(source, url, title, summary, published_at))
}

/// Keep undated articles and articles published within `max_age_hours` of `now`.
pub fn is_fresh(article: &Article, now: DateTime<Utc>, max_age_hours: u32) -> bool {
    match article.published_at {
        None => true,
        Some(ts) => ts >= now - ChronoDuration::hours(i64::from(max_age_hours)),
    }
}

/// Lowercase, drop punctuation, collapse whitespace.
fn title_fingerprint(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse the same story picked up by several feeds/queries.
/// A TRUSTED copy replaces an earlier GENERAL one, since it faces the lower
/// threshold; otherwise the first occurrence wins. Returns (kept, removed_count).
pub fn dedup_by_title(articles: Vec<Article>) -> (Vec<Article>, usize) {
    let mut slot_of: HashMap<String, usize> = HashMap::new();
    let mut keep: Vec<Article> = Vec::with_capacity(articles.len());
    let mut removed = 0usize;

    for a in articles {
        let fp = title_fingerprint(&a.title);
        if fp.chars().count() > TITLE_MIN_CHARS {
            let prefix: String = fp.chars().take(TITLE_PREFIX_CHARS).collect();
            if let Some(&slot) = slot_of.get(&prefix) {
                removed += 1;
                if keep[slot].source_trust_tier == TrustTier::General
                    && a.source_trust_tier == TrustTier::Trusted
                {
                    tracing::debug!(target: "ingest", title = %a.title, source = %a.source_id, replaced = %keep[slot].source_id, "trusted copy replaces cross-source duplicate");
                    keep[slot] = a;
                } else {
                    tracing::debug!(target: "ingest", title = %a.title, source = %a.source_id, "cross-source duplicate removed");
                }
                continue;
            }
            slot_of.insert(prefix, keep.len());
        }
        keep.push(a);
    }

    (keep, removed)
}

/// Outcome of one collection pass.
#[derive(Debug, Default)]
pub struct Collected {
    pub articles: Vec<Article>,
    pub malformed: usize,
    pub stale: usize,
    pub cross_source_duplicates: usize,
    pub provider_errors: usize,
}

/// Validate, age-filter and title-dedup raw items from one or more sources.
pub fn normalize_filter_dedup(
    now: DateTime<Utc>,
    batches: Vec<(FeedSource, Vec<RawItem>)>,
    max_age_hours: u32,
) -> Collected {
    let mut out = Collected::default();
    let mut fresh = Vec::new();

    for (source, items) in batches {
        for item in items {
            match article_from_item(&source, item) {
                Ok(a) if is_fresh(&a, now, max_age_hours) => fresh.push(a),
                Ok(_) => out.stale += 1,
                Err(e) => {
                    tracing::warn!(target: "ingest", source = %source.id, error = %e, "skipping article");
                    out.malformed += 1;
                }
            }
        }
    }

    let (kept, removed) = dedup_by_title(fresh);
    out.articles = kept;
    out.cross_source_duplicates = removed;
    out
}

/// Run every provider once and return the validated article list.
/// A failing provider is logged and counted, never fatal.
pub async fn collect(
    providers: &[Box<dyn SourceProvider>],
    now: DateTime<Utc>,
    max_age_hours: u32,
) -> Collected {
    crate::metrics::ensure_described();

    let mut batches = Vec::with_capacity(providers.len());
    let mut provider_errors = 0usize;
    for p in providers {
        let src = p.source();
        match p.fetch_latest().await {
            Ok(items) => {
                tracing::info!(target: "ingest", source = %src.id, items = items.len(), "fetched");
                batches.push((src.clone(), items));
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, source = %src.id, "provider error");
                counter!("ingest_provider_errors_total").increment(1);
                provider_errors += 1;
            }
        }
    }

    let mut collected = normalize_filter_dedup(now, batches, max_age_hours);
    collected.provider_errors = provider_errors;

    counter!("ingest_articles_total").increment(collected.articles.len() as u64);
    counter!("ingest_malformed_total").increment(collected.malformed as u64);
    counter!("ingest_stale_total").increment(collected.stale as u64);
    counter!("ingest_title_dedup_total").increment(collected.cross_source_duplicates as u64);

    tracing::info!(
        target: "ingest",
        kept = collected.articles.len(),
        malformed = collected.malformed,
        stale = collected.stale,
        cross_source_duplicates = collected.cross_source_duplicates,
        provider_errors = collected.provider_errors,
        "collection finished"
    );

    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn src() -> FeedSource {
        FeedSource {
            id: "dnd".into(),
            name: "National Defence".into(),
            category: "government".into(),
            tier: TrustTier::Trusted,
        }
    }

    fn item(title: &str, link: &str, published: Option<&str>) -> RawItem {
        RawItem {
            title: Some(title.into()),
            link: Some(link.into()),
            summary: None,
            published: published.map(str::to_string),
        }
    }

    #[test]
    fn normalize_text_strips_tags_and_collapses_ws() {
        let s = "  <p>Arctic&nbsp;&nbsp;patrol</p><b>ships</b>  ";
        assert_eq!(normalize_text(s), "Arctic patrol ships");
    }

    #[test]
    fn parses_rss_and_atom_dates() {
        let a = parse_published("Tue, 14 Oct 2025 09:30:00 +0000").unwrap();
        let b = parse_published("2025-10-14T09:30:00Z").unwrap();
        assert_eq!(a, b);
        assert!(parse_published("yesterday-ish").is_none());
    }

    #[test]
    fn missing_link_and_bad_date_are_malformed() {
        let no_link = RawItem {
            title: Some("t".into()),
            ..RawItem::default()
        };
        assert!(matches!(
            article_from_item(&src(), no_link),
            Err(DigestError::MalformedArticle(_))
        ));
        let bad_date = item("t", "https://a.ca/x", Some("not a date"));
        assert!(matches!(
            article_from_item(&src(), bad_date),
            Err(DigestError::MalformedArticle(_))
        ));
        let undated = article_from_item(&src(), item("t", "https://a.ca/x", None)).unwrap();
        assert!(undated.published_at.is_none());
        assert_eq!(undated.source_trust_tier, TrustTier::Trusted);
    }

    #[test]
    fn age_filter_keeps_undated() {
        let now = Utc.with_ymd_and_hms(2025, 10, 14, 12, 0, 0).unwrap();
        let batches = vec![(
            src(),
            vec![
                item("Fresh arctic story", "https://a.ca/1", Some("2025-10-14T08:00:00Z")),
                item("Old arctic story", "https://a.ca/2", Some("2025-10-10T08:00:00Z")),
                item("Undated arctic story", "https://a.ca/3", None),
                item("Broken", "", None),
            ],
        )];
        let out = normalize_filter_dedup(now, batches, 48);
        assert_eq!(out.articles.len(), 2);
        assert_eq!(out.stale, 1);
        assert_eq!(out.malformed, 1);
    }

    #[test]
    fn same_title_from_two_queries_collapses() {
        let s = src();
        let a = Article::new(&s, "https://a.ca/1", "Canada buys new submarines for Arctic patrols", "", None);
        let b = Article::new(&s, "https://b.ca/9", "Canada buys new submarines for Arctic patrols!", "", None);
        let short1 = Article::new(&s, "https://a.ca/2", "Short title", "", None);
        let short2 = Article::new(&s, "https://a.ca/3", "Short title", "", None);
        let (kept, removed) = dedup_by_title(vec![a, b, short1, short2]);
        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].url, "https://a.ca/1");
    }

    #[test]
    fn trusted_copy_wins_title_collapse() {
        let general = FeedSource {
            id: "gnews-norad".into(),
            name: "Google News: NORAD".into(),
            category: "google_news".into(),
            tier: TrustTier::General,
        };
        let trusted = src();
        let title = "NORAD modernization contract awarded to Canadian firm";
        let g = Article::new(&general, "https://news.example/norad", title, "", None);
        let t = Article::new(&trusted, "https://canada.ca/norad", title, "", None);
        let g2 = Article::new(&general, "https://other.example/norad", title, "", None);
        let (kept, removed) = dedup_by_title(vec![g, t, g2]);
        assert_eq!(removed, 2);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "https://canada.ca/norad");
        assert_eq!(kept[0].source_trust_tier, TrustTier::Trusted);
    }
}
