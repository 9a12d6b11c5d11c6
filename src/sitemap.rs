//! Sitemap retrieval and `<loc>` extraction.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::errors::FetchError;

// `(?s)` so a <loc> split across lines still matches.
static LOC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<loc>\s*(.*?)\s*</loc>").unwrap());

static CDATA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^<!\[CDATA\[(.*)\]\]>$").unwrap());

/// Fetches sitemap documents and lists the page URLs they contain.
#[derive(Debug, Clone)]
pub struct SitemapResolver {
    client: reqwest::Client,
}

impl SitemapResolver {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch `sitemap_url` and return every `<loc>` in document order.
    ///
    /// An empty vector is a valid answer; deciding whether that ends the run
    /// is the caller's job.
    pub async fn resolve(&self, sitemap_url: &str) -> Result<Vec<String>, FetchError> {
        let response = self
            .client
            .get(sitemap_url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: sitemap_url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: sitemap_url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Body {
            url: sitemap_url.to_string(),
            source,
        })?;

        let urls = extract_locs(&body);
        debug!(sitemap = sitemap_url, count = urls.len(), "resolved sitemap");
        Ok(urls)
    }
}

/// Extract the text of every `<loc>` element, duplicates preserved.
pub fn extract_locs(document: &str) -> Vec<String> {
    LOC_REGEX
        .captures_iter(document)
        .filter_map(|cap| cap.get(1))
        .map(|m| {
            let raw = m.as_str();
            match CDATA_REGEX.captures(raw).and_then(|c| c.get(1)) {
                Some(inner) => inner.as_str().trim().to_string(),
                None => decode_entities(raw),
            }
        })
        .filter(|url| !url.is_empty())
        .collect()
}

fn decode_entities(text: &str) -> String {
    // &amp; last so "&amp;lt;" decodes to "&lt;" rather than "<".
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
