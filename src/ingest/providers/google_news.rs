// src/ingest/providers/google_news.rs
//! Keyword-search feeds: one Google News RSS query becomes one GENERAL-tier source.

use url::form_urlencoded::byte_serialize;

use crate::ingest::types::{FeedSource, TrustTier};

pub const DEFAULT_BASE_URL: &str =
    "https://news.google.com/rss/search?q={query}&hl=en-CA&gl=CA&ceid=CA:en";
pub const CATEGORY: &str = "google_news";
pub const NAME_PREFIX: &str = "Google News - ";

/// Substitute the form-encoded query into `base_url`'s `{query}` slot.
pub fn query_feed_url(base_url: &str, query: &str) -> String {
    let encoded: String = byte_serialize(query.as_bytes()).collect();
    base_url.replace("{query}", &encoded)
}

/// Stable id from the label: lowercase ASCII alphanumerics joined by `-`.
fn slug(label: &str) -> String {
    label
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Feed source for a search query. Search results are uncurated, hence GENERAL.
pub fn query_source(label: &str) -> FeedSource {
    FeedSource {
        id: format!("gnews-{}", slug(label)),
        name: format!("{NAME_PREFIX}{label}"),
        category: CATEGORY.to_string(),
        tier: TrustTier::General,
    }
}

/// Display name without the search prefix.
pub fn display_name(source_name: &str) -> &str {
    source_name.strip_prefix(NAME_PREFIX).unwrap_or(source_name)
}
