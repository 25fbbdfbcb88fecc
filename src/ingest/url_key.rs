// src/ingest/url_key.rs
//! Canonical dedup key for an article URL.
//!
//! The key is scheme-insensitive and ignores tracking parameters, fragments,
//! default ports and trailing slashes: `host[:port]/path[?sorted_query]`.

use url::Url;

use crate::error::{DigestError, Result};

/// Query parameters that never change which article a URL points to.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "mc_cid", "mc_eid", "oc", "ocid", "cmpid", "ref", "ref_src",
    "igshid", "_ga",
];

fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

/// Normalize a raw article URL into its dedup key.
///
/// Fails with `MalformedArticle` for empty, unparseable or non-http(s) URLs.
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DigestError::MalformedArticle("missing url".into()));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| DigestError::MalformedArticle(format!("unparseable url `{trimmed}`: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DigestError::MalformedArticle(format!(
            "unsupported url scheme `{}`",
            parsed.scheme()
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| DigestError::MalformedArticle(format!("url without host `{trimmed}`")))?
        .to_ascii_lowercase();

    let mut key = host;
    // `port()` is None for the scheme's default port.
    if let Some(port) = parsed.port() {
        if port != 80 && port != 443 {
            key.push(':');
            key.push_str(&port.to_string());
        }
    }

    let path = parsed.path().trim_end_matches('/');
    key.push_str(path);

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !params.is_empty() {
        params.sort();
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        key.push('?');
        key.push_str(&query);
    }

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_and_trailing_slash_do_not_matter() {
        let a = normalize_url("https://www.canada.ca/en/news/arctic/").unwrap();
        let b = normalize_url("http://www.canada.ca/en/news/arctic").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "www.canada.ca/en/news/arctic");
    }

    #[test]
    fn tracking_params_and_fragment_are_dropped() {
        let a = normalize_url(
            "https://news.example.com/story?id=7&utm_source=rss&utm_medium=feed#comments",
        )
        .unwrap();
        assert_eq!(a, "news.example.com/story?id=7");
        let b = normalize_url("https://news.example.com/story?fbclid=abc&id=7").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn remaining_params_are_sorted_and_host_lowercased() {
        let a = normalize_url("https://NEWS.example.com/s?b=2&a=1").unwrap();
        assert_eq!(a, "news.example.com/s?a=1&b=2");
    }

    #[test]
    fn default_port_dropped_custom_port_kept() {
        assert_eq!(
            normalize_url("https://example.com:443/a").unwrap(),
            "example.com/a"
        );
        assert_eq!(
            normalize_url("http://example.com:8080/a").unwrap(),
            "example.com:8080/a"
        );
    }

    #[test]
    fn missing_or_bad_urls_are_malformed() {
        assert!(matches!(
            normalize_url("   "),
            Err(DigestError::MalformedArticle(_))
        ));
        assert!(matches!(
            normalize_url("not a url"),
            Err(DigestError::MalformedArticle(_))
        ));
        assert!(matches!(
            normalize_url("ftp://example.com/file"),
            Err(DigestError::MalformedArticle(_))
        ));
    }
}
