//! Typed error hierarchy for sitelens.
//!
//! The enums follow the lifecycle of a run:
//! - `FetchError`: the sitemap could not be retrieved
//! - `EngineError`: the audit engine session could not start or stop
//! - `PageAuditError`: one page failed; recorded inline, never run-fatal
//! - `StoreError`: result store reads, writes and lookups
//! - `RunError`: the run-level failures that end a progress stream

use thiserror::Error;

/// Errors from retrieving a sitemap document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors from acquiring or releasing an audit engine session.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("browser did not become ready within {secs}s")]
    LaunchTimeout { secs: u64 },

    #[error("DevTools protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Per-page failure. Recorded as a failed `PageResult`; the run continues.
#[derive(Debug, Error)]
pub enum PageAuditError {
    #[error("navigation to {url} timed out after {secs}s")]
    NavigationTimeout { url: String, secs: u64 },

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("audit engine failed on {url}: {message}")]
    Engine { url: String, message: String },

    #[error("malformed audit report for {url}: {message}")]
    MalformedReport { url: String, message: String },
}

/// Errors from the on-disk result store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run {key} not found")]
    NotFound { key: String },

    #[error("invalid run key: {0}")]
    InvalidKey(String),

    #[error("refusing to store a run with no page results")]
    EmptyRecord,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize {path}: {source}")]
    Serialization {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Run-level failures. Each one ends the progress stream with a single
/// terminal error event carrying `to_string()` as its message.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to fetch sitemap: {0}")]
    Fetch(#[from] FetchError),

    #[error("No URLs found in sitemap")]
    EmptySitemap,

    #[error("Failed to launch audit engine: {0}")]
    EngineLaunch(#[source] EngineError),

    #[error("Failed to save results: {0}")]
    Persistence(#[source] StoreError),

    #[error("Run aborted: {0}")]
    Aborted(String),
}
