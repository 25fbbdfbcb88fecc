// src/ingest/providers/feed.rs
//! RSS 2.0 / Atom provider, fed either over HTTP or from an in-memory fixture.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::types::{FeedSource, RawItem, SourceProvider};

pub const REQUEST_TIMEOUT_SECS: u64 = 15;
pub const USER_AGENT: &str = concat!("Mozilla/5.0 (compatible; newsbot/", env!("CARGO_PKG_VERSION"), ")");

/* ---- RSS 2.0 ---- */

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/* ---- Atom ---- */

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    #[serde(default)]
    link: Vec<AtomLink>,
    summary: Option<String>,
    content: Option<String>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl AtomEntry {
    /// `rel="alternate"` (or no rel) is the article itself.
    fn article_link(&self) -> Option<String> {
        self.link
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.link.first())
            .and_then(|l| l.href.clone())
    }
}

/// HTML entities that are not valid XML but show up in real feeds.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&eacute;", "é")
        .replace("&egrave;", "è")
        .replace("&agrave;", "à")
        .replace("&ccedil;", "ç")
}

/// Parse an RSS 2.0 or Atom document into raw items.
pub fn parse_feed(xml: &str) -> Result<Vec<RawItem>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);

    let items = if xml_clean.contains("<rss") {
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;
        rss.channel
            .item
            .into_iter()
            .map(|it| RawItem {
                title: it.title,
                link: it.link,
                summary: it.description,
                published: it.pub_date,
            })
            .collect::<Vec<_>>()
    } else if xml_clean.contains("<feed") {
        let atom: AtomFeed = from_str(&xml_clean).context("parsing atom xml")?;
        atom.entry
            .into_iter()
            .map(|e| {
                let link = e.article_link();
                RawItem {
                    title: e.title,
                    link,
                    summary: e.summary.or(e.content),
                    published: e.published.or(e.updated),
                }
            })
            .collect()
    } else {
        return Err(anyhow!("unrecognized feed format (no <rss> or <feed> root)"));
    };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_items_parsed_total").increment(items.len() as u64);
    Ok(items)
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

pub struct FeedProvider {
    source: FeedSource,
    mode: Mode,
}

impl FeedProvider {
    /// Serve a fixed document (tests, offline previews).
    pub fn from_fixture(source: FeedSource, xml: &str) -> Self {
        Self {
            source,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(source: FeedSource, url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            source,
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }
}

#[async_trait]
impl SourceProvider for FeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        match &self.mode {
            Mode::Fixture(s) => parse_feed(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .with_context(|| format!("feed http get {url}"))?
                    .error_for_status()
                    .with_context(|| format!("feed non-2xx {url}"))?
                    .text()
                    .await
                    .context("feed http .text()")?;
                parse_feed(&body).with_context(|| format!("feed {}", self.source.id))
            }
        }
    }

    fn source(&self) -> &FeedSource {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>National Defence news</title>
    <item>
      <title>Canada signs Arctic defence procurement deal</title>
      <link>https://www.canada.ca/en/news/1</link>
      <pubDate>Tue, 14 Oct 2025 09:30:00 +0000</pubDate>
      <description><![CDATA[<p>New patrol ships&nbsp;for the North.</p>]]></description>
    </item>
    <item>
      <title>Minister visits CFB Esquimalt</title>
      <link>https://www.canada.ca/en/news/2</link>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Think tank</title>
  <entry>
    <title>NORAD modernization explained</title>
    <link rel="alternate" href="https://cgai.ca/norad"/>
    <updated>2025-10-14T10:00:00Z</updated>
    <summary>Continental defence and the Arctic.</summary>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_items() {
        let items = parse_feed(RSS).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].link.as_deref(),
            Some("https://www.canada.ca/en/news/1")
        );
        assert!(items[0].summary.as_deref().unwrap().contains("patrol ships"));
        assert!(items[1].published.is_none());
    }

    #[test]
    fn parses_atom_entries() {
        let items = parse_feed(ATOM).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link.as_deref(), Some("https://cgai.ca/norad"));
        assert_eq!(items[0].published.as_deref(), Some("2025-10-14T10:00:00Z"));
    }

    #[test]
    fn html_error_page_is_an_error() {
        assert!(parse_feed("<html><body>503 Service Unavailable</body></html>").is_err());
    }
}
