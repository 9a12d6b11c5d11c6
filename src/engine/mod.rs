//! Audit engine seam.
//!
//! The orchestrator only sees two traits: an [`AuditEngine`] that launches a
//! long-lived [`AuditSession`], and the session itself, which navigates one
//! shared page and audits it. [`chrome::ChromeEngine`] is the real
//! implementation (headless Chrome + Lighthouse CLI).

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::EngineError;

pub mod cdp;
pub mod chrome;
pub mod report;

pub use chrome::{ChromeEngine, EngineSettings};
pub use report::parse_report;

/// Something that can start an audit session.
#[async_trait]
pub trait AuditEngine: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn AuditSession>, EngineError>;
}

/// One browser session, reused for every URL of a run.
#[async_trait]
pub trait AuditSession: Send {
    /// Load `url` in the session's page and return once the network has
    /// settled. The caller bounds this with its own timeout.
    async fn navigate(&mut self, url: &str) -> anyhow::Result<()>;

    /// Audit `url` and return the raw Lighthouse result.
    async fn audit(&mut self, url: &str) -> anyhow::Result<Value>;

    /// Release the browser. Called exactly once per launched session.
    async fn close(self: Box<Self>) -> Result<(), EngineError>;
}
