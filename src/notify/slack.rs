// src/notify/slack.rs
use anyhow::Result;
use reqwest::Client;
use std::time::Duration;

use super::{
    category_label, date_heading, group_by_category, post_json_with_retry, published_label,
    source_label, truncate_title, Notifier, DIGEST_TITLE, MAX_TITLE_CHARS,
};
use crate::digest::Digest;

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, n: u8) -> Self {
        self.max_retries = n;
        self
    }
}

/// Slack mrkdwn body: bold header, one section per category, `<url|title>` links.
pub fn format_text(digest: &Digest) -> String {
    let date = date_heading(digest.generated_at);
    if digest.is_empty() {
        return format!("*{DIGEST_TITLE}* ({date})\nNo new relevant articles found today.");
    }
    let mut text = format!("*{DIGEST_TITLE}* ({date}, {} articles)", digest.len());
    for (category, entries) in group_by_category(&digest.entries) {
        text.push_str(&format!("\n\n*{}*", category_label(category)));
        for e in entries {
            // '|' and '>' would end the link early
            let title = truncate_title(&e.article.title, MAX_TITLE_CHARS)
                .replace('|', "/")
                .replace('>', "\u{203A}");
            text.push_str(&format!(
                "\n\u{2022} <{}|{}>\n   _{} \u{00B7} {}_",
                e.article.url,
                title,
                source_label(e),
                published_label(e.article.published_at)
            ));
        }
    }
    text
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn deliver(&self, digest: &Digest) -> Result<()> {
        let body = serde_json::json!({ "text": format_text(digest) });
        post_json_with_retry(
            &self.client,
            &self.webhook_url,
            &body,
            self.timeout,
            self.max_retries,
            |s| s.is_success(),
        )
        .await?;
        Ok(())
    }
}
