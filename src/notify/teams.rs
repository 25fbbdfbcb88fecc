// src/notify/teams.rs
//! Microsoft Teams Workflows webhook ("Post to a channel when a webhook
//! request is received"). The payload is a message wrapping one Adaptive Card.

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::{
    category_label, date_heading, group_by_category, post_json_with_retry, published_label,
    source_label, truncate_title, Notifier, DIGEST_TITLE, MAX_TITLE_CHARS,
};
use crate::digest::{Digest, DigestEntry};

#[derive(Clone)]
pub struct TeamsNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl TeamsNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }
}

fn category_color(category: &str) -> &'static str {
    match category {
        "government" => "Light",
        "think_tank" => "Good",
        "google_news" => "Accent",
        _ => "Default",
    }
}

fn header(subtitle: String) -> Value {
    json!({
        "type": "Container",
        "style": "emphasis",
        "bleed": true,
        "items": [
            {
                "type": "TextBlock",
                "text": format!("\u{1F6E1} {DIGEST_TITLE}"),
                "weight": "Bolder",
                "size": "Large",
                "wrap": true,
                "color": "Light"
            },
            {
                "type": "TextBlock",
                "text": subtitle,
                "size": "Small",
                "isSubtle": true,
                "spacing": "None",
                "wrap": true
            }
        ]
    })
}

fn article_block(e: &DigestEntry) -> Value {
    let title = truncate_title(&e.article.title, MAX_TITLE_CHARS);
    let subtitle = format!(
        "{} \u{00B7} {}",
        source_label(e),
        published_label(e.article.published_at)
    );
    json!({
        "type": "Container",
        "spacing": "Medium",
        "items": [
            {
                "type": "TextBlock",
                "text": format!("\u{25AA} [{title}]({})", e.article.url),
                "wrap": true,
                "spacing": "None",
                "weight": "Bolder"
            },
            {
                "type": "TextBlock",
                "text": subtitle,
                "isSubtle": true,
                "spacing": "None",
                "size": "Small",
                "wrap": true
            }
        ]
    })
}

fn wrap_card(body: Vec<Value>) -> Value {
    json!({
        "type": "message",
        "attachments": [
            {
                "contentType": "application/vnd.microsoft.card.adaptive",
                "contentUrl": null,
                "content": {
                    "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
                    "type": "AdaptiveCard",
                    "version": "1.4",
                    "body": body
                }
            }
        ]
    })
}

/// Full webhook payload for `digest`; a short "nothing new" card when empty.
pub fn build_card(digest: &Digest) -> Value {
    let date = date_heading(digest.generated_at);
    if digest.is_empty() {
        return wrap_card(vec![
            header(date),
            json!({
                "type": "TextBlock",
                "text": "No new relevant articles found today. All sources checked.",
                "wrap": true,
                "spacing": "Large",
                "isSubtle": true
            }),
        ]);
    }

    let mut body = vec![header(format!(
        "{date}  \u{2022}  {} articles",
        digest.len()
    ))];
    for (category, entries) in group_by_category(&digest.entries) {
        body.push(json!({
            "type": "TextBlock",
            "text": category_label(category),
            "weight": "Bolder",
            "size": "Medium",
            "spacing": "Large",
            "color": category_color(category),
            "wrap": true,
            "separator": true
        }));
        body.extend(entries.into_iter().map(article_block));
    }
    wrap_card(body)
}

#[async_trait::async_trait]
impl Notifier for TeamsNotifier {
    fn name(&self) -> &'static str {
        "teams"
    }

    async fn deliver(&self, digest: &Digest) -> Result<()> {
        let payload = build_card(digest);
        let status = post_json_with_retry(
            &self.client,
            &self.webhook,
            &payload,
            self.timeout,
            self.max_retries,
            |s| s == StatusCode::OK || s == StatusCode::ACCEPTED,
        )
        .await?;
        tracing::debug!(target: "notify", channel = "teams", status = status.as_u16(), "webhook accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{digest, entry};
    use super::*;

    fn body(card: &Value) -> &Vec<Value> {
        card["attachments"][0]["content"]["body"].as_array().unwrap()
    }

    #[test]
    fn empty_digest_gets_no_news_card() {
        let card = build_card(&digest(Vec::new()));
        let b = body(&card);
        assert_eq!(b.len(), 2);
        assert!(b[1]["text"].as_str().unwrap().starts_with("No new relevant articles"));
        assert_eq!(card["attachments"][0]["content"]["type"], "AdaptiveCard");
    }

    #[test]
    fn card_groups_by_category_and_cleans_source() {
        let d = digest(vec![
            entry("google_news", "Google News - Arctic", "Arctic patrol ships", "https://x.ca/a"),
            entry("government", "National Defence", "NORAD modernization", "https://canada.ca/b"),
        ]);
        let card = build_card(&d);
        let b = body(&card);
        // header, gov label, gov article, news label, news article
        assert_eq!(b.len(), 5);
        assert!(b[0]["items"][1]["text"].as_str().unwrap().contains("2 articles"));
        assert_eq!(b[1]["text"], "\u{1F3DB} Government");
        let sub = b[4]["items"][1]["text"].as_str().unwrap();
        assert!(sub.starts_with("Arctic \u{00B7} Oct 14, 2025"), "{sub}");
        let link = b[4]["items"][0]["text"].as_str().unwrap();
        assert!(link.contains("(https://x.ca/a)"));
    }

    #[tokio::test]
    async fn unreachable_webhook_is_error() {
        let n = TeamsNotifier::new("http://127.0.0.1:9/hook".into())
            .with_timeout(1)
            .with_retries(1);
        assert!(n.deliver(&digest(Vec::new())).await.is_err());
    }
}
