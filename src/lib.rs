// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod cli;
pub mod config;
pub mod dedup;
pub mod digest;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod relevance;

// ---- Re-exports for stable public API ----
pub use crate::config::{KeywordConfig, SourcesConfig, Thresholds};
pub use crate::dedup::{DedupRecord, DedupStats, DedupStore, MemoryDedupStore, SqliteDedupStore};
pub use crate::digest::{assemble, Digest, DigestEntry};
pub use crate::error::{DigestError, Result};
pub use crate::ingest::types::{Article, FeedSource, TrustTier};
pub use crate::relevance::{score, ScoreResult};
