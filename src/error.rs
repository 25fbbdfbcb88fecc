// src/error.rs
//! Structural errors of a digest run.
//!
//! Only `Config` and `PersistenceUnavailable` abort a run. `MalformedArticle`
//! is recovered by skipping the single article. A low score is never an
//! error; it is a normal `ScoreResult`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DigestError>;

#[derive(Error, Debug)]
pub enum DigestError {
    /// Malformed or missing configuration. Fatal, raised before any scoring.
    #[error("configuration error: {0}")]
    Config(String),

    /// Dedup store cannot be opened or queried. Fatal.
    #[error("dedup store unavailable: {0}")]
    PersistenceUnavailable(String),

    /// One article cannot be used (no URL, bad timestamp). Skipped locally.
    #[error("malformed article: {0}")]
    MalformedArticle(String),

    /// The delivery collaborator reported a failure.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl DigestError {
    /// Whether this error must abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DigestError::Config(_) | DigestError::PersistenceUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for DigestError {
    fn from(e: sqlx::Error) -> Self {
        DigestError::PersistenceUnavailable(e.to_string())
    }
}
