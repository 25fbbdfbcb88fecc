// src/ingest/providers/mod.rs
pub mod feed;
pub mod google_news;

use anyhow::Result;

use crate::config::sources::SourcesConfig;
use crate::ingest::types::SourceProvider;

pub use feed::FeedProvider;

/// One HTTP provider per configured feed and per Google News query.
pub fn build_providers(cfg: &SourcesConfig) -> Result<Vec<Box<dyn SourceProvider>>> {
    let mut out: Vec<Box<dyn SourceProvider>> = Vec::new();
    for f in &cfg.feeds {
        out.push(Box::new(FeedProvider::from_url(f.source(), &f.feed_url)?));
    }
    let base = cfg.google_news_base_url();
    for q in &cfg.google_news_queries {
        let url = google_news::query_feed_url(base, &q.query);
        out.push(Box::new(FeedProvider::from_url(
            google_news::query_source(&q.label),
            url,
        )?));
    }
    Ok(out)
}
