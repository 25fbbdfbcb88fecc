// src/config/sources.rs
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{DigestError, Result};
use crate::ingest::providers::google_news;
use crate::ingest::types::{FeedSource, TrustTier};

pub const ENV_SOURCES_PATH: &str = "NEWSBOT_SOURCES_PATH";

fn default_category() -> String {
    "news".to_string()
}

/// A directly subscribed RSS/Atom feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub feed_url: String,
    pub tier: TrustTier,
    #[serde(default = "default_category")]
    pub category: String,
}

impl FeedConfig {
    pub fn source(&self) -> FeedSource {
        FeedSource {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            category: self.category.clone(),
            tier: self.tier,
        }
    }
}

/// A keyword search turned into a feed; always GENERAL tier.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    pub query: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub google_news_base_url: Option<String>,
    #[serde(default)]
    pub google_news_queries: Vec<QueryConfig>,
}

impl SourcesConfig {
    pub fn google_news_base_url(&self) -> &str {
        self.google_news_base_url
            .as_deref()
            .unwrap_or(google_news::DEFAULT_BASE_URL)
    }

    /// Every source id (feeds + queries) must be unique and every source usable.
    pub fn validate(self) -> Result<Self> {
        if self.feeds.is_empty() && self.google_news_queries.is_empty() {
            return Err(DigestError::Config("no feeds or queries configured".into()));
        }
        if !self.google_news_base_url().contains("{query}") {
            return Err(DigestError::Config(
                "google_news_base_url must contain a {query} placeholder".into(),
            ));
        }

        let mut ids = HashSet::new();
        for f in &self.feeds {
            if f.id.trim().is_empty() || f.feed_url.trim().is_empty() {
                return Err(DigestError::Config(format!(
                    "feed `{}` needs a non-empty id and feed_url",
                    f.id
                )));
            }
            if !ids.insert(f.id.clone()) {
                return Err(DigestError::Config(format!("duplicate feed id `{}`", f.id)));
            }
        }
        for q in &self.google_news_queries {
            if q.query.trim().is_empty() {
                return Err(DigestError::Config(format!("query `{}` is empty", q.label)));
            }
            let id = google_news::query_source(&q.label).id;
            if !ids.insert(id.clone()) {
                return Err(DigestError::Config(format!("duplicate source id `{id}`")));
            }
        }
        Ok(self)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        super::parse_toml::<Self>(s)?.validate()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        super::read_file::<Self>(path)?.validate()
    }

    /// `$NEWSBOT_SOURCES_PATH` → `config/sources.toml` → `config/sources.json`.
    pub fn load_default() -> Result<Self> {
        let path = super::resolve_path(ENV_SOURCES_PATH, "sources")?;
        let cfg = Self::load_from(&path)?;
        tracing::info!(
            target: "config",
            path = %path.display(),
            feeds = cfg.feeds.len(),
            queries = cfg.google_news_queries.len(),
            "sources loaded"
        );
        Ok(cfg)
    }
}
