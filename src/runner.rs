//! Single-page audit attempt with failure isolation.

use std::time::Duration;

use tracing::{info, warn};

use crate::engine::{AuditSession, parse_report};
use crate::errors::PageAuditError;
use crate::models::{PageResult, PageScores};

pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs exactly one audit attempt per URL and never fails the caller:
/// every error becomes a failed [`PageResult`].
#[derive(Debug, Clone)]
pub struct AuditRunner {
    navigation_timeout: Duration,
}

impl Default for AuditRunner {
    fn default() -> Self {
        Self::new(DEFAULT_NAVIGATION_TIMEOUT)
    }
}

impl AuditRunner {
    pub fn new(navigation_timeout: Duration) -> Self {
        Self { navigation_timeout }
    }

    pub async fn audit_page(&self, session: &mut dyn AuditSession, url: &str) -> PageResult {
        match self.attempt(session, url).await {
            Ok(scores) => {
                info!(url, performance = scores.performance, "page audited");
                PageResult::success(url, scores)
            }
            Err(e) => {
                warn!(url, error = %e, "page audit failed");
                PageResult::failure(url)
            }
        }
    }

    async fn attempt(
        &self,
        session: &mut dyn AuditSession,
        url: &str,
    ) -> Result<PageScores, PageAuditError> {
        match tokio::time::timeout(self.navigation_timeout, session.navigate(url)).await {
            Err(_) => {
                return Err(PageAuditError::NavigationTimeout {
                    url: url.to_string(),
                    secs: self.navigation_timeout.as_secs(),
                });
            }
            Ok(Err(e)) => {
                return Err(PageAuditError::Navigation {
                    url: url.to_string(),
                    message: format!("{:#}", e),
                });
            }
            Ok(Ok(())) => {}
        }

        let report = session
            .audit(url)
            .await
            .map_err(|e| PageAuditError::Engine {
                url: url.to_string(),
                message: format!("{:#}", e),
            })?;

        parse_report(&report).map_err(|message| PageAuditError::MalformedReport {
            url: url.to_string(),
            message,
        })
    }
}
