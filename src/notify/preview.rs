// src/notify/preview.rs
use std::fmt::Write as _;

use super::{category_label, date_heading, group_by_category, published_label, source_label, DIGEST_TITLE};
use crate::digest::Digest;

fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Plain-text rendering printed by dry runs. Shows exactly what would be sent,
/// plus each entry's confidence and matched keywords.
pub fn render_preview(digest: &Digest) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();
    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "  \u{1F6E1} {DIGEST_TITLE}");
    let _ = writeln!(
        out,
        "  {}  \u{2022}  {} articles",
        date_heading(digest.generated_at),
        digest.len()
    );
    let _ = writeln!(out, "{rule}");

    if digest.is_empty() {
        let _ = writeln!(out, "\n  No new relevant articles found today.\n");
        return out;
    }

    for (category, entries) in group_by_category(&digest.entries) {
        let _ = writeln!(out, "\n  {}", category_label(category));
        let _ = writeln!(out, "  {}", "\u{2500}".repeat(40));
        for e in entries {
            let matched: Vec<&str> = e
                .score
                .matched_primary
                .iter()
                .chain(e.score.matched_context.iter())
                .map(String::as_str)
                .collect();
            let _ = writeln!(out, "  \u{25AA} {}", clip(&e.article.title, 80));
            let _ = writeln!(
                out,
                "    {} \u{00B7} {}",
                source_label(e),
                published_label(e.article.published_at)
            );
            let _ = writeln!(out, "    {}", clip(&e.article.url, 80));
            let _ = writeln!(
                out,
                "    confidence {:.2} [{}]",
                e.score.confidence,
                matched.join(", ")
            );
        }
    }

    if digest.counters.truncated > 0 {
        let _ = writeln!(
            out,
            "\n  (+{} more accepted, cut by the digest size limit)",
            digest.counters.truncated
        );
    }
    let _ = writeln!(out, "\n{rule}");
    out
}
