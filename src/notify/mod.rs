// src/notify/mod.rs
//! Digest delivery: Teams Adaptive Cards, Slack text, and the dry-run preview.

pub mod preview;
pub mod slack;
pub mod teams;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::digest::{Digest, DigestEntry};
use crate::ingest::providers::google_news;

pub use preview::render_preview;
pub use slack::SlackNotifier;
pub use teams::TeamsNotifier;

pub const DIGEST_TITLE: &str = "Defence & Sovereignty News";
pub const MAX_TITLE_CHARS: usize = 150;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logs.
    fn name(&self) -> &'static str;

    /// Ok only when the channel confirmed receipt.
    async fn deliver(&self, digest: &Digest) -> Result<()>;
}

/// Fans one digest out to every configured channel.
pub struct NotifierMux {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Teams and/or Slack, whichever webhook URLs are set (empty strings ignored).
    pub fn from_webhooks(teams: Option<&str>, slack: Option<&str>) -> Self {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
        if let Some(url) = teams.map(str::trim).filter(|u| !u.is_empty()) {
            notifiers.push(Box::new(TeamsNotifier::new(url.to_string())));
        }
        if let Some(url) = slack.map(str::trim).filter(|u| !u.is_empty()) {
            notifiers.push(Box::new(SlackNotifier::new(url.to_string())));
        }
        Self { notifiers }
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Succeeds if at least one channel accepted the digest; failures on the
    /// other channels are logged.
    pub async fn deliver(&self, digest: &Digest) -> Result<()> {
        if self.notifiers.is_empty() {
            return Err(anyhow!("no delivery channel configured"));
        }
        let mut delivered = 0usize;
        let mut last_err = None;
        for n in &self.notifiers {
            match n.deliver(digest).await {
                Ok(()) => {
                    tracing::info!(target: "notify", channel = n.name(), entries = digest.len(), "digest delivered");
                    delivered += 1;
                }
                Err(e) => {
                    tracing::error!(target: "notify", channel = n.name(), error = ?e, "delivery failed");
                    counter!("notify_delivery_failures_total").increment(1);
                    last_err = Some(e);
                }
            }
        }
        match (delivered, last_err) {
            (0, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }
}

/// Webhook POST with a per-request timeout and exponential backoff
/// (500 ms, 1 s, 2 s, ...). `accept` decides which statuses count as delivered.
pub(crate) async fn post_json_with_retry(
    client: &Client,
    url: &str,
    body: &serde_json::Value,
    timeout: Duration,
    max_retries: u8,
    accept: fn(StatusCode) -> bool,
) -> Result<StatusCode> {
    let max_retries = max_retries.max(1);
    let mut attempt: u8 = 0;
    loop {
        attempt += 1;
        counter!("notify_delivery_attempts_total").increment(1);
        let res = client.post(url).timeout(timeout).json(body).send().await;

        let err = match res {
            Ok(rsp) if accept(rsp.status()) => return Ok(rsp.status()),
            Ok(rsp) => {
                let status = rsp.status();
                let text = rsp.text().await.unwrap_or_default();
                let snippet: String = text.chars().take(300).collect();
                anyhow!("webhook returned HTTP {status}: {snippet}")
            }
            Err(e) => anyhow!("webhook request failed: {e}"),
        };

        if attempt >= max_retries {
            return Err(err);
        }
        tracing::warn!(target: "notify", attempt, error = %err, "retrying webhook");
        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
    }
}

/// "Government", "News & Media", ... ; unknown categories are title-cased.
pub fn category_label(category: &str) -> String {
    match category {
        "government" => "\u{1F3DB} Government".to_string(),
        "think_tank" => "\u{1F4DA} Research & Analysis".to_string(),
        "google_news" => "\u{1F4F0} News & Media".to_string(),
        other => {
            let mut out = String::with_capacity(other.len());
            for (i, word) in other.split(['_', ' ']).filter(|w| !w.is_empty()).enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                let mut cs = word.chars();
                if let Some(first) = cs.next() {
                    out.extend(first.to_uppercase());
                    out.push_str(cs.as_str());
                }
            }
            out
        }
    }
}

/// Entries grouped by category; well-known categories first, then the rest in
/// order of first appearance. Rank order is kept inside each group.
pub fn group_by_category(entries: &[DigestEntry]) -> Vec<(&str, Vec<&DigestEntry>)> {
    const ORDER: [&str; 3] = ["government", "think_tank", "google_news"];
    let mut groups: Vec<(&str, Vec<&DigestEntry>)> = Vec::new();
    for e in entries {
        let cat = e.article.category.as_str();
        match groups.iter_mut().find(|(c, _)| *c == cat) {
            Some((_, v)) => v.push(e),
            None => groups.push((cat, vec![e])),
        }
    }
    groups.sort_by_key(|(c, _)| ORDER.iter().position(|o| o == c).unwrap_or(ORDER.len()));
    groups
}

pub fn truncate_title(title: &str, max: usize) -> String {
    if title.chars().count() > max {
        let mut s: String = title.chars().take(max).collect();
        s.push_str("...");
        s
    } else {
        title.to_string()
    }
}

pub fn source_label(entry: &DigestEntry) -> &str {
    google_news::display_name(&entry.article.source_name)
}

pub fn published_label(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

pub fn date_heading(now: DateTime<Utc>) -> String {
    now.format("%A, %B %d, %Y").to_string()
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    struct Fixed(&'static str, bool);

    #[async_trait::async_trait]
    impl Notifier for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }
        async fn deliver(&self, _digest: &Digest) -> Result<()> {
            if self.1 {
                Ok(())
            } else {
                Err(anyhow!("{} down", self.0))
            }
        }
    }

    #[test]
    fn labels_and_grouping() {
        assert_eq!(category_label("government"), "\u{1F3DB} Government");
        assert_eq!(category_label("defence_industry"), "Defence Industry");
        let entries = vec![
            entry("news", "CBC", "a", "https://cbc.ca/a"),
            entry("google_news", "Google News - NORAD", "b", "https://x.ca/b"),
            entry("government", "DND", "c", "https://canada.ca/c"),
            entry("news", "CBC", "d", "https://cbc.ca/d"),
        ];
        let groups = group_by_category(&entries);
        let cats: Vec<_> = groups.iter().map(|(c, v)| (*c, v.len())).collect();
        assert_eq!(cats, vec![("government", 1), ("google_news", 1), ("news", 2)]);
        assert_eq!(source_label(&entries[1]), "NORAD");
    }

    #[test]
    fn title_truncation_counts_chars() {
        let long = "é".repeat(160);
        let t = truncate_title(&long, MAX_TITLE_CHARS);
        assert_eq!(t.chars().count(), MAX_TITLE_CHARS + 3);
        assert_eq!(truncate_title("short", MAX_TITLE_CHARS), "short");
    }

    #[tokio::test]
    async fn mux_needs_one_successful_channel() {
        let d = digest(Vec::new());
        let ok = NotifierMux::new(vec![Box::new(Fixed("teams", false)), Box::new(Fixed("slack", true))]);
        assert!(ok.deliver(&d).await.is_ok());
        let bad = NotifierMux::new(vec![Box::new(Fixed("teams", false))]);
        assert!(bad.deliver(&d).await.is_err());
        assert!(NotifierMux::from_webhooks(Some("  "), None).is_empty());
        assert!(NotifierMux::new(Vec::new()).deliver(&d).await.is_err());
    }
}
