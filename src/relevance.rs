// src/relevance.rs
//! Relevance scorer: text folding, keyword matching and the two-layer decision.
//!
//! Layer 1 vetoes articles that hit a negative keyword and no primary keyword.
//! Layer 2 scores `min(1, 0.5 * primary_hits + 0.2 * context_hits)` and gates it
//! against the per-tier threshold. Context hits alone never qualify.
//!
//! Scoring is a pure function of (article text, trust tier, keyword config).

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::keywords::{Keyword, KeywordConfig};
use crate::ingest::types::{Article, TrustTier};

pub const REASON_NO_TEXT: &str = "no_text";
pub const REASON_NEGATIVE_VETO: &str = "negative_keyword_veto";
pub const REASON_NO_PRIMARY: &str = "no_primary_match";

// Weights in tenths so confidences land exactly on the same f32 as "0.7" in config.
const PRIMARY_WEIGHT_TENTHS: usize = 5;
const CONTEXT_WEIGHT_TENTHS: usize = 2;

// Dev logging gate: NEWSBOT_DEV_LOG=1 AND dev env (debug build or NEWSBOT_ENV in {local,development,dev})
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var("NEWSBOT_DEV_LOG").ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("NEWSBOT_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub(crate) fn truncate_vec<'a, I>(v: I, max: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    v.into_iter().take(max).cloned().collect()
}

/// Minimal, anonymized dev logger for scoring decisions. Never logs raw text.
fn dev_log_relevance(text: &str, r: &ScoreResult, threshold: f32) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(text);
    info!(
        target: "relevance",
        %id,
        confidence = r.confidence,
        %threshold,
        passed = r.passed,
        reason = %r.reason,
        primary = ?truncate_vec(&r.matched_primary, 5),
        context = ?truncate_vec(&r.matched_context, 5),
        negative = ?truncate_vec(&r.matched_negative, 5),
        "scored"
    );
}

/// Outcome of scoring one article. Built fresh per call, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub passed: bool,
    pub confidence: f32,
    pub matched_primary: BTreeSet<String>,
    pub matched_context: BTreeSet<String>,
    pub matched_negative: BTreeSet<String>,
    pub reason: String,
}

impl ScoreResult {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            confidence: 0.0,
            matched_primary: BTreeSet::new(),
            matched_context: BTreeSet::new(),
            matched_negative: BTreeSet::new(),
            reason: reason.into(),
        }
    }
}

/// Word tokens (Unicode `\w+`).
pub fn tokenize(input: &str) -> Vec<&str> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"(?u)\w+").expect("tokenizer regex"));
    re.find_iter(input).map(|m| m.as_str()).collect()
}

/// Fold one char of NFKD-decomposed, lowercased text. Marks go away, so a
/// precomposed letter and its decomposed form end up identical. Letters with
/// no canonical decomposition are mapped by hand.
fn fold_char(c: char, out: &mut String) {
    match c {
        'ß' => out.push_str("ss"),
        'æ' => out.push_str("ae"),
        'œ' => out.push_str("oe"),
        'ø' => out.push('o'),
        'ł' => out.push('l'),
        'đ' => out.push('d'),
        c if is_combining_mark(c) => {}
        _ => out.push(c),
    }
}

/// Case-fold, strip diacritics, and join word tokens with single spaces.
/// Keywords and article text go through the same function before matching.
pub fn normalize_for_match(input: &str) -> String {
    let mut folded = String::with_capacity(input.len());
    for c in input.to_lowercase().nfkd() {
        fold_char(c, &mut folded);
    }
    tokenize(&folded).join(" ")
}

fn matches_in(keywords: &[Keyword], haystack: &str) -> BTreeSet<String> {
    keywords
        .iter()
        .filter(|k| k.is_in(haystack))
        .map(|k| k.term.clone())
        .collect()
}

/// Confidence for the given hit counts; zero without a primary hit.
pub fn confidence(primary_hits: usize, context_hits: usize) -> f32 {
    if primary_hits == 0 {
        return 0.0;
    }
    let tenths = (PRIMARY_WEIGHT_TENTHS * primary_hits + CONTEXT_WEIGHT_TENTHS * context_hits).min(10);
    tenths as f32 / 10.0
}

/// Score an article's `title + " " + summary` for its source's trust tier.
pub fn score(article: &Article, cfg: &KeywordConfig) -> ScoreResult {
    let text = format!("{} {}", article.title, article.summary);
    score_text(&text, article.source_trust_tier, cfg)
}

/// Score free text as if it came from a source of `tier`.
pub fn score_text(text: &str, tier: TrustTier, cfg: &KeywordConfig) -> ScoreResult {
    let threshold = cfg.thresholds.for_tier(tier);
    let normalized = normalize_for_match(text);
    if normalized.is_empty() {
        let r = ScoreResult::rejected(REASON_NO_TEXT);
        dev_log_relevance(text, &r, threshold);
        return r;
    }
    let haystack = format!(" {normalized} ");

    let matched_primary = matches_in(&cfg.primary_keywords, &haystack);
    let matched_context = matches_in(&cfg.context_keywords, &haystack);
    let matched_negative = matches_in(&cfg.negative_keywords, &haystack);

    // 1) Negative veto, overridden by any primary hit
    let vetoed = !matched_negative.is_empty() && matched_primary.is_empty();

    // 2) Positive score
    let conf = if vetoed {
        0.0
    } else {
        confidence(matched_primary.len(), matched_context.len())
    };

    // 3) Threshold gate
    let passed = !vetoed && !matched_primary.is_empty() && conf >= threshold;
    let reason = if vetoed {
        REASON_NEGATIVE_VETO.to_string()
    } else if matched_primary.is_empty() {
        REASON_NO_PRIMARY.to_string()
    } else if passed {
        format!("threshold_ok:{threshold:.2}")
    } else {
        format!("below_threshold:{threshold:.2}")
    };

    let r = ScoreResult {
        passed,
        confidence: conf,
        matched_primary,
        matched_context,
        matched_negative,
        reason,
    };
    dev_log_relevance(text, &r, threshold);
    r
}

/* ----------------------------
Tests
---------------------------- */
