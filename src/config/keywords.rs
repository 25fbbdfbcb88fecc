// src/config/keywords.rs
//! Keyword configuration for the relevance scorer, validated once at load time.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DigestError, Result};
use crate::ingest::types::TrustTier;
use crate::relevance::normalize_for_match;

pub const ENV_KEYWORDS_PATH: &str = "NEWSBOT_KEYWORDS_PATH";
pub const ENV_THRESHOLD_TRUSTED: &str = "NEWSBOT_THRESHOLD_TRUSTED";
pub const ENV_THRESHOLD_GENERAL: &str = "NEWSBOT_THRESHOLD_GENERAL";

/// Minimum confidence per trust tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub trusted: f32,
    pub general: f32,
}

impl Thresholds {
    pub fn for_tier(&self, tier: TrustTier) -> f32 {
        match tier {
            TrustTier::Trusted => self.trusted,
            TrustTier::General => self.general,
        }
    }
}

/// A configured keyword and its match form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    /// As configured, trimmed and lowercased. Reported as evidence.
    pub term: String,
    /// Space-padded, folded token sequence searched in the padded text.
    needle: String,
}

impl Keyword {
    fn new(raw: &str) -> Option<Self> {
        let folded = normalize_for_match(raw);
        if folded.is_empty() {
            return None;
        }
        Some(Self {
            term: raw.trim().to_lowercase(),
            needle: format!(" {folded} "),
        })
    }

    /// `haystack` must be `" " + normalize_for_match(text) + " "`.
    pub fn is_in(&self, haystack: &str) -> bool {
        haystack.contains(&self.needle)
    }
}

/// On-disk shape. Every category is required; context/negative may be empty.
#[derive(Debug, Deserialize)]
struct RawKeywordConfig {
    primary_keywords: Vec<String>,
    context_keywords: Vec<String>,
    negative_keywords: Vec<String>,
    thresholds: Thresholds,
}

/// Immutable for the duration of a run; passed by reference into every scoring call.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordConfig {
    pub primary_keywords: Vec<Keyword>,
    pub context_keywords: Vec<Keyword>,
    pub negative_keywords: Vec<Keyword>,
    pub thresholds: Thresholds,
}

fn compile(category: &str, items: Vec<String>) -> Vec<Keyword> {
    let mut out: Vec<Keyword> = Vec::new();
    for raw in super::clean_list(items) {
        match Keyword::new(&raw) {
            Some(k) if !out.iter().any(|o| o.needle == k.needle) => out.push(k),
            Some(_) => {}
            None => tracing::warn!(target: "config", category, keyword = %raw, "keyword has no word characters; ignored"),
        }
    }
    out
}

fn check_threshold(name: &str, v: f32) -> Result<()> {
    if v.is_finite() && (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(DigestError::Config(format!(
            "thresholds.{name} must be within [0, 1], got {v}"
        )))
    }
}

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

impl KeywordConfig {
    fn from_raw(raw: RawKeywordConfig) -> Result<Self> {
        let primary_keywords = compile("primary", raw.primary_keywords);
        if primary_keywords.is_empty() {
            return Err(DigestError::Config(
                "primary_keywords must contain at least one keyword".into(),
            ));
        }
        check_threshold("trusted", raw.thresholds.trusted)?;
        check_threshold("general", raw.thresholds.general)?;

        Ok(Self {
            primary_keywords,
            context_keywords: compile("context", raw.context_keywords),
            negative_keywords: compile("negative", raw.negative_keywords),
            thresholds: raw.thresholds,
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Self::from_raw(super::parse_toml(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Self::from_raw(super::parse_json(s)?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Self::from_raw(super::read_file(path)?)
    }

    /// Load via `$NEWSBOT_KEYWORDS_PATH` → `config/keywords.toml` → `config/keywords.json`,
    /// then apply optional per-tier threshold overrides from the environment.
    pub fn load_default() -> Result<Self> {
        let path = super::resolve_path(ENV_KEYWORDS_PATH, "keywords")?;
        let mut cfg = Self::load_from(&path)?;
        if let Some(t) = parse_threshold_env(std::env::var(ENV_THRESHOLD_TRUSTED).ok()) {
            cfg.thresholds.trusted = t;
        }
        if let Some(t) = parse_threshold_env(std::env::var(ENV_THRESHOLD_GENERAL).ok()) {
            cfg.thresholds.general = t;
        }
        tracing::info!(
            target: "config",
            path = %path.display(),
            primary = cfg.primary_keywords.len(),
            context = cfg.context_keywords.len(),
            negative = cfg.negative_keywords.len(),
            trusted = cfg.thresholds.trusted,
            general = cfg.thresholds.general,
            "keyword config loaded"
        );
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
primary_keywords = ["Defence procurement", "NORAD", " norad ", "", "Arctic sovereignty"]
context_keywords = ["military", "Canadian Armed Forces"]
negative_keywords = ["hockey", "--"]

[thresholds]
trusted = 0.3
general = 0.5
"#;

    #[test]
    fn loads_cleans_and_dedups() {
        let cfg = KeywordConfig::from_toml_str(TOML).unwrap();
        let terms: Vec<_> = cfg.primary_keywords.iter().map(|k| k.term.as_str()).collect();
        assert_eq!(terms, vec!["defence procurement", "norad", "arctic sovereignty"]);
        assert_eq!(cfg.negative_keywords.len(), 1);
        assert_eq!(cfg.thresholds.for_tier(TrustTier::Trusted), 0.3);
        assert_eq!(cfg.thresholds.for_tier(TrustTier::General), 0.5);
    }

    #[test]
    fn missing_category_is_config_error() {
        let s = r#"
primary_keywords = ["norad"]
context_keywords = []

[thresholds]
trusted = 0.3
general = 0.5
"#;
        assert!(matches!(
            KeywordConfig::from_toml_str(s),
            Err(DigestError::Config(_))
        ));
    }

    #[test]
    fn empty_primary_is_config_error() {
        let s = r#"{"primary_keywords": ["  "], "context_keywords": [], "negative_keywords": [],
                    "thresholds": {"trusted": 0.3, "general": 0.5}}"#;
        assert!(matches!(
            KeywordConfig::from_json_str(s),
            Err(DigestError::Config(_))
        ));
    }

    #[test]
    fn out_of_range_threshold_is_config_error() {
        let s = TOML.replace("general = 0.5", "general = 1.5");
        assert!(matches!(
            KeywordConfig::from_toml_str(&s),
            Err(DigestError::Config(_))
        ));
    }

    #[test]
    fn threshold_env_values_are_clamped() {
        assert_eq!(parse_threshold_env(Some(" 0.4 ".into())), Some(0.4));
        assert_eq!(parse_threshold_env(Some("7".into())), Some(1.0));
        assert_eq!(parse_threshold_env(Some("abc".into())), None);
        assert_eq!(parse_threshold_env(None), None);
    }

    #[test]
    fn phrase_matches_across_punctuation() {
        let k = Keyword::new("Defence Procurement").unwrap();
        let hay = format!(" {} ", normalize_for_match("Ottawa's defence-procurement overhaul"));
        assert!(k.is_in(&hay));
        let hay2 = format!(" {} ", normalize_for_match("defenceless procurement"));
        assert!(!k.is_in(&hay2));
    }
}
