//! Shared types: sitemap identity, page results, run records, progress events.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Failure marker stored for every page whose audit did not complete.
pub const ANALYSIS_FAILED: &str = "Analysis failed";

// ── Identity and timestamps ──────────────────────────────────────────

/// SHA-256 fingerprint of a sitemap URL string.
///
/// Derived from the URL text alone. Two runs against the same URL share an
/// identity even if the document behind it changed in between.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SitemapIdentity(String);

impl SitemapIdentity {
    pub fn from_url(sitemap_url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(sitemap_url.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Accepts an already-computed digest (e.g. parsed back from a filename).
    pub fn parse(hex: &str) -> Option<Self> {
        let valid = hex.len() == 64 && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then(|| Self(hex.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SitemapIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current time as an ISO-8601 UTC string with millisecond precision,
/// e.g. `2026-10-17T09:30:12.345Z`.
pub fn run_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn is_valid_timestamp(timestamp: &str) -> bool {
    DateTime::parse_from_rfc3339(timestamp).is_ok()
}

// ── Page results ─────────────────────────────────────────────────────

/// Display strings for the five timing metrics, verbatim from the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetrics {
    pub fcp: String,
    pub lcp: String,
    pub tbt: String,
    pub cls: String,
    pub speed_index: String,
}

/// Category scores normalized to 0–100, plus the timing metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageScores {
    pub performance: u8,
    pub accessibility: u8,
    pub best_practices: u8,
    pub seo: u8,
    pub metrics: PageMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageOutcome {
    Failure { error: String },
    Success(PageScores),
}

/// One URL's outcome within a run.
///
/// Serialized flat: a success carries `performance`, `accessibility`,
/// `bestPractices`, `seo` and `metrics`; a failure carries only `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitemap_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub outcome: PageOutcome,
}

impl PageResult {
    pub fn success(url: impl Into<String>, scores: PageScores) -> Self {
        Self {
            url: url.into(),
            sitemap_url: None,
            timestamp: None,
            outcome: PageOutcome::Success(scores),
        }
    }

    pub fn failure(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sitemap_url: None,
            timestamp: None,
            outcome: PageOutcome::Failure {
                error: ANALYSIS_FAILED.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, PageOutcome::Success(_))
    }

    pub fn scores(&self) -> Option<&PageScores> {
        match &self.outcome {
            PageOutcome::Success(scores) => Some(scores),
            PageOutcome::Failure { .. } => None,
        }
    }

    /// Tag the result with the run it belongs to.
    pub fn tagged(mut self, sitemap_url: &str, timestamp: &str) -> Self {
        self.sitemap_url = Some(sitemap_url.to_string());
        self.timestamp = Some(timestamp.to_string());
        self
    }
}

// ── Run records ──────────────────────────────────────────────────────

/// One completed (or partially failed) audit batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub sitemap_url: String,
    pub identity: SitemapIdentity,
    pub timestamp: String,
    pub results: Vec<PageResult>,
}

impl RunRecord {
    /// Build a record, tagging every result with the run's sitemap URL and timestamp.
    pub fn new(sitemap_url: &str, timestamp: &str, results: Vec<PageResult>) -> Self {
        let results = results
            .into_iter()
            .map(|r| r.tagged(sitemap_url, timestamp))
            .collect();
        Self {
            sitemap_url: sitemap_url.to_string(),
            identity: SitemapIdentity::from_url(sitemap_url),
            timestamp: timestamp.to_string(),
            results,
        }
    }

    pub fn key(&self) -> String {
        run_key(&self.identity, &self.timestamp)
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Storage key of a run: `{identity}-{timestamp}`.
pub fn run_key(identity: &SitemapIdentity, timestamp: &str) -> String {
    format!("{}-{}", identity, timestamp)
}

/// Distinct sitemap URLs and run timestamps across the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub sitemap_urls: Vec<String>,
    pub timestamps: Vec<String>,
}

// ── Progress events ──────────────────────────────────────────────────

const PAGE_SUCCEEDED_PREFIX: &str = "Analyzed ";
const PAGE_FAILED_PREFIX: &str = "Failed to analyze ";

/// One update on a run's progress channel.
///
/// Variant order matters for deserialization: the untagged representation
/// is matched top to bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressEvent {
    Failed {
        error: bool,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Completed {
        progress: f64,
        timestamp: String,
        sitemap_url: String,
    },
    Page {
        progress: f64,
        total: usize,
        current: usize,
        message: String,
    },
    Started {
        progress: f64,
        total: usize,
        message: String,
    },
}

impl ProgressEvent {
    pub fn started(total: usize) -> Self {
        ProgressEvent::Started {
            progress: 0.0,
            total,
            message: "starting".to_string(),
        }
    }

    pub fn page(completed: usize, total: usize, result: &PageResult) -> Self {
        let progress = if total == 0 {
            100.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        let message = if result.is_success() {
            format!("{}{}", PAGE_SUCCEEDED_PREFIX, result.url)
        } else {
            format!("{}{}", PAGE_FAILED_PREFIX, result.url)
        };
        ProgressEvent::Page {
            progress,
            total,
            current: completed,
            message,
        }
    }

    pub fn completed(timestamp: &str, sitemap_url: &str) -> Self {
        ProgressEvent::Completed {
            progress: 100.0,
            timestamp: timestamp.to_string(),
            sitemap_url: sitemap_url.to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ProgressEvent::Failed {
            error: true,
            message: message.into(),
            timestamp: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Completed { .. } | ProgressEvent::Failed { .. })
    }

    /// True for a page event reporting a failed attempt.
    pub fn is_page_failure(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Page { message, .. } if message.starts_with(PAGE_FAILED_PREFIX)
        )
    }

    pub fn progress(&self) -> Option<f64> {
        match self {
            ProgressEvent::Started { progress, .. }
            | ProgressEvent::Page { progress, .. }
            | ProgressEvent::Completed { progress, .. } => Some(*progress),
            ProgressEvent::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scores() -> PageScores {
        PageScores {
            performance: 91,
            accessibility: 100,
            best_practices: 78,
            seo: 92,
            metrics: PageMetrics {
                fcp: "0.8 s".to_string(),
                lcp: "1.9 s".to_string(),
                tbt: "30 ms".to_string(),
                cls: "0.01".to_string(),
                speed_index: "1.2 s".to_string(),
            },
        }
    }

    #[test]
    fn identity_is_deterministic_and_hex() {
        let a = SitemapIdentity::from_url("https://example.com/sitemap.xml");
        let b = SitemapIdentity::from_url("https://example.com/sitemap.xml");
        let c = SitemapIdentity::from_url("https://example.com/sitemap.xml?v=2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(SitemapIdentity::parse(a.as_str()), Some(a));
    }

    #[test]
    fn identity_parse_rejects_non_digest() {
        assert!(SitemapIdentity::parse("../etc").is_none());
        assert!(SitemapIdentity::parse(&"A".repeat(64)).is_none());
        assert!(SitemapIdentity::parse("abc").is_none());
    }

    #[test]
    fn timestamp_has_millisecond_precision_and_z_suffix() {
        let ts = run_timestamp();
        assert!(ts.ends_with('Z'), "got {}", ts);
        assert_eq!(ts.len(), "2026-10-17T09:30:12.345Z".len());
        assert!(is_valid_timestamp(&ts));
        assert!(!is_valid_timestamp("../../secret"));
    }

    #[test]
    fn success_result_serializes_flat() {
        let result = PageResult::success("https://example.com/", sample_scores());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["url"], "https://example.com/");
        assert_eq!(json["performance"], 91);
        assert_eq!(json["bestPractices"], 78);
        assert_eq!(json["metrics"]["speedIndex"], "1.2 s");
        assert!(json.get("error").is_none());
        assert!(json.get("sitemapUrl").is_none());
    }

    #[test]
    fn failure_result_serializes_error_only() {
        let result = PageResult::failure("https://example.com/broken");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"url": "https://example.com/broken", "error": "Analysis failed"})
        );
    }

    #[test]
    fn tagged_results_deserialize_into_the_right_variant() {
        let ok = PageResult::success("https://a/", sample_scores()).tagged("https://a/sm.xml", "t");
        let bad = PageResult::failure("https://b/").tagged("https://a/sm.xml", "t");
        let json = serde_json::to_string(&vec![ok.clone(), bad.clone()]).unwrap();
        let back: Vec<PageResult> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![ok, bad]);
        assert!(back[0].is_success());
        assert!(!back[1].is_success());
    }

    #[test]
    fn run_record_tags_every_result() {
        let record = RunRecord::new(
            "https://example.com/sitemap.xml",
            "2026-10-17T09:30:12.345Z",
            vec![PageResult::failure("https://example.com/")],
        );
        assert_eq!(record.results[0].sitemap_url.as_deref(), Some("https://example.com/sitemap.xml"));
        assert_eq!(record.results[0].timestamp.as_deref(), Some("2026-10-17T09:30:12.345Z"));
        assert!(record.key().ends_with("-2026-10-17T09:30:12.345Z"));
        assert_eq!(record.failed(), 1);
    }

    #[test]
    fn progress_events_match_wire_shapes() {
        let started = serde_json::to_value(ProgressEvent::started(3)).unwrap();
        assert_eq!(started["progress"], 0.0);
        assert_eq!(started["total"], 3);
        assert_eq!(started["message"], "starting");
        assert!(started.get("current").is_none());

        let done = serde_json::to_value(ProgressEvent::completed("ts", "https://x/sm.xml")).unwrap();
        assert_eq!(done["progress"], 100.0);
        assert_eq!(done["sitemapUrl"], "https://x/sm.xml");

        let failed = serde_json::to_value(ProgressEvent::failed("No URLs found in sitemap")).unwrap();
        assert_eq!(
            failed,
            serde_json::json!({"error": true, "message": "No URLs found in sitemap"})
        );
    }

    #[test]
    fn page_failure_is_read_back_from_the_event() {
        let failed = ProgressEvent::page(1, 2, &PageResult::failure("https://example.com/a"));
        let scored = PageResult::success("https://example.com/b", sample_scores());
        let ok = ProgressEvent::page(2, 2, &scored);
        assert!(failed.is_page_failure());
        assert!(!ok.is_page_failure());
        assert!(!ProgressEvent::failed("Failed to fetch sitemap").is_page_failure());
    }

    #[test]
    fn page_event_reaches_exactly_one_hundred() {
        let result = PageResult::failure("https://example.com/c");
        let first = ProgressEvent::page(1, 3, &result);
        let last = ProgressEvent::page(3, 3, &result);
        assert!(first.progress().unwrap() > 0.0);
        assert_eq!(last.progress(), Some(100.0));
        match last {
            ProgressEvent::Page { current, message, .. } => {
                assert_eq!(current, 3);
                assert!(message.contains("https://example.com/c"));
            }
            other => panic!("Expected Page, got {:?}", other),
        }
    }

    #[test]
    fn progress_events_deserialize_in_variant_order() {
        for event in [
            ProgressEvent::started(2),
            ProgressEvent::page(1, 2, &PageResult::failure("https://a/")),
            ProgressEvent::completed("ts", "https://a/sm.xml"),
            ProgressEvent::failed("boom"),
        ] {
            let json = serde_json::to_string(&event).unwrap();
            let back: ProgressEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }
}
