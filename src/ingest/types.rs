// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-source classification. Trusted sources pre-filter their own output and
/// get a lower confidence bar; general sources (incl. keyword-search feeds)
/// get a higher one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    Trusted,
    General,
}

impl TrustTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustTier::Trusted => "trusted",
            TrustTier::General => "general",
        }
    }
}

/// Where an article came from. Stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub id: String,       // e.g. "dnd-news", "gnews-arctic-sovereignty"
    pub name: String,     // display name, e.g. "National Defence"
    pub category: String, // display grouping, e.g. "government", "google_news"
    pub tier: TrustTier,
}

/// One entry exactly as a feed parser produced it, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub published: Option<String>, // RFC 2822 or RFC 3339, as found in the feed
}

/// A collected article, ephemeral for one collection cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub source_id: String,
    pub source_name: String,
    pub category: String,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source_trust_tier: TrustTier,
}

impl Article {
    /// Build an article owned by `source`; metadata is copied from the feed source.
    pub fn new(
        source: &FeedSource,
        url: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            category: source.category.clone(),
            url: url.into(),
            title: title.into(),
            summary: summary.into(),
            published_at,
            source_trust_tier: source.tier,
        }
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>>;
    fn source(&self) -> &FeedSource;
}
