//! Run orchestration: sitemap → engine session → sequential audits → store.
//!
//! A run moves through
//! `Idle → ResolvingSitemap → LaunchingEngine → AuditingPages → Persisting → Completed`
//! and can drop to `Failed` from any working state. Each run is its own value;
//! nothing is shared between concurrent runs except the [`ResultStore`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Context;
use futures::FutureExt;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::SitelensToml;
use crate::engine::{AuditEngine, AuditSession, ChromeEngine};
use crate::errors::RunError;
use crate::models::{PageResult, ProgressEvent, RunRecord, run_timestamp};
use crate::progress::{self, ProgressReceiver, ProgressSender};
use crate::runner::AuditRunner;
use crate::sitemap::SitemapResolver;
use crate::store::ResultStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ResolvingSitemap,
    LaunchingEngine,
    AuditingPages,
    Persisting,
    Completed,
    Failed,
}

/// Validate that a run state transition is allowed.
pub fn is_valid_transition(from: RunState, to: RunState) -> bool {
    use RunState::*;
    matches!(
        (from, to),
        (Idle, ResolvingSitemap)
            | (ResolvingSitemap, LaunchingEngine)
            | (LaunchingEngine, AuditingPages)
            | (AuditingPages, Persisting)
            | (Persisting, Completed)
            | (ResolvingSitemap | LaunchingEngine | AuditingPages | Persisting, Failed)
    )
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunRecord),
    /// `unsaved` holds the audited record when only persistence failed.
    Failed {
        error: RunError,
        unsaved: Option<RunRecord>,
    },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

struct RunFailure {
    error: RunError,
    unsaved: Option<RunRecord>,
}

impl From<RunError> for RunFailure {
    fn from(error: RunError) -> Self {
        Self {
            error,
            unsaved: None,
        }
    }
}

/// Per-run bookkeeping threaded through the pipeline.
struct RunContext<'a> {
    sitemap_url: &'a str,
    timestamp: String,
    state: RunState,
}

impl RunContext<'_> {
    fn transition(&mut self, next: RunState) {
        if !is_valid_transition(self.state, next) {
            warn!(from = ?self.state, to = ?next, "unexpected run state transition");
        }
        info!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }
}

pub struct RunOrchestrator {
    resolver: SitemapResolver,
    engine: Arc<dyn AuditEngine>,
    runner: AuditRunner,
    store: ResultStore,
}

impl RunOrchestrator {
    pub fn new(
        resolver: SitemapResolver,
        engine: Arc<dyn AuditEngine>,
        runner: AuditRunner,
        store: ResultStore,
    ) -> Self {
        Self {
            resolver,
            engine,
            runner,
            store,
        }
    }

    /// Wire the real Chrome engine, resolver and store from configuration.
    pub fn from_config(config: &SitelensToml) -> anyhow::Result<Self> {
        let resolver = SitemapResolver::new(config.fetch_timeout(), &config.sitemap.user_agent)
            .context("Failed to build HTTP client")?;
        Ok(Self::new(
            resolver,
            Arc::new(ChromeEngine::new(config.engine_settings())),
            AuditRunner::new(config.navigation_timeout()),
            ResultStore::new(config.storage.results_dir.clone()),
        ))
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Start a run on its own task and return its progress channel.
    ///
    /// The run keeps going if the receiver is dropped; only delivery stops.
    pub fn spawn(self: &Arc<Self>, sitemap_url: String) -> ProgressReceiver {
        let (tx, rx) = progress::channel();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.execute(&sitemap_url, tx).await;
        });
        rx
    }

    /// Run the whole pipeline inline, reporting through `progress`.
    pub async fn execute(&self, sitemap_url: &str, progress: ProgressSender) -> RunOutcome {
        let mut run = RunContext {
            sitemap_url,
            timestamp: run_timestamp(),
            state: RunState::Idle,
        };
        let span = info_span!("run", sitemap = sitemap_url, timestamp = %run.timestamp);

        async move {
            match self.drive(&mut run, &progress).await {
                Ok(record) => {
                    run.transition(RunState::Completed);
                    info!(
                        pages = record.results.len(),
                        failed = record.failed(),
                        "run completed"
                    );
                    progress.finish(ProgressEvent::completed(&run.timestamp, sitemap_url));
                    RunOutcome::Completed(record)
                }
                Err(RunFailure { error, unsaved }) => {
                    run.transition(RunState::Failed);
                    error!(error = %error, "run failed");
                    progress.finish(ProgressEvent::Failed {
                        error: true,
                        message: error.to_string(),
                        timestamp: unsaved.as_ref().map(|r| r.timestamp.clone()),
                    });
                    RunOutcome::Failed { error, unsaved }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        run: &mut RunContext<'_>,
        progress: &ProgressSender,
    ) -> Result<RunRecord, RunFailure> {
        run.transition(RunState::ResolvingSitemap);
        let urls = self
            .resolver
            .resolve(run.sitemap_url)
            .await
            .map_err(RunError::from)?;
        if urls.is_empty() {
            return Err(RunError::EmptySitemap.into());
        }
        info!(pages = urls.len(), "sitemap resolved");
        progress.started(urls.len());

        run.transition(RunState::LaunchingEngine);
        let mut session = self
            .engine
            .launch()
            .await
            .map_err(RunError::EngineLaunch)?;

        run.transition(RunState::AuditingPages);
        let audited = AssertUnwindSafe(self.audit_all(session.as_mut(), &urls, progress))
            .catch_unwind()
            .await;
        // Released on every path, including a panic inside the page loop.
        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close audit session");
        }
        let results = audited.map_err(|panic| RunError::Aborted(panic_message(&*panic)))?;

        run.transition(RunState::Persisting);
        let record = RunRecord::new(run.sitemap_url, &run.timestamp, results);
        match self.store.put(&record).await {
            Ok(path) => {
                info!(path = %path.display(), "run stored");
                Ok(record)
            }
            Err(e) => Err(RunFailure {
                error: RunError::Persistence(e),
                unsaved: Some(record),
            }),
        }
    }

    async fn audit_all(
        &self,
        session: &mut dyn AuditSession,
        urls: &[String],
        progress: &ProgressSender,
    ) -> Vec<PageResult> {
        let total = urls.len();
        let mut results = Vec::with_capacity(total);
        for (index, url) in urls.iter().enumerate() {
            let result = self.runner.audit_page(session, url).await;
            progress.page(index + 1, total, &result);
            results.push(result);
        }
        results
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "page processing panicked".to_string()
    }
}
