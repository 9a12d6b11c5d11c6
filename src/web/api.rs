use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::sse;
use crate::errors::StoreError;
use crate::models::SitemapIdentity;
use crate::orchestrator::RunOrchestrator;
use crate::store::ResultStore;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub orchestrator: Arc<RunOrchestrator>,
    pub store: ResultStore,
}

impl AppState {
    pub fn new(orchestrator: Arc<RunOrchestrator>) -> Self {
        let store = orchestrator.store().clone();
        Self {
            orchestrator,
            store,
        }
    }
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

/// `sitemapUrl` + `timestamp` selector shared by fetch and delete.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSelector {
    pub sitemap_url: Option<String>,
    pub timestamp: Option<String>,
}

impl RunSelector {
    fn parts(&self) -> (Option<&str>, Option<&str>) {
        (non_empty(&self.sitemap_url), non_empty(&self.timestamp))
    }

    fn require_both(&self) -> Result<(&str, &str), ApiError> {
        match self.parts() {
            (Some(url), Some(ts)) => Ok((url, ts)),
            _ => Err(ApiError::BadRequest(
                "Both sitemapUrl and timestamp are required".into(),
            )),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted: bool,
    pub sitemap_url: String,
    pub timestamp: String,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound("Results not found".into()),
            StoreError::InvalidKey(_) => ApiError::BadRequest(
                "Malformed timestamp: expected RFC 3339, e.g. 2026-01-31T12:00:00.000Z".into(),
            ),
            other => {
                error!(error = %other, "result store failure");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/analyze", get(sse::analyze).post(sse::analyze))
        .route("/api/results", get(get_results).delete(delete_results))
        .route("/api/runs", get(list_runs))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

/// Catalog when no selector is given, one run's flat result array otherwise.
async fn get_results(
    State(state): State<SharedState>,
    Query(selector): Query<RunSelector>,
) -> Result<Response, ApiError> {
    if let (None, None) = selector.parts() {
        let catalog = state.store.catalog().await?;
        return Ok(Json(catalog).into_response());
    }
    let (sitemap_url, timestamp) = selector.require_both()?;
    let record = state
        .store
        .get(&SitemapIdentity::from_url(sitemap_url), timestamp)
        .await?;
    Ok(Json(record.results).into_response())
}

async fn delete_results(
    State(state): State<SharedState>,
    Query(selector): Query<RunSelector>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let (sitemap_url, timestamp) = selector.require_both()?;
    state
        .store
        .delete(&SitemapIdentity::from_url(sitemap_url), timestamp)
        .await?;
    info!(sitemap = sitemap_url, timestamp, "run deleted via API");
    Ok(Json(DeleteResponse {
        deleted: true,
        sitemap_url: sitemap_url.to_string(),
        timestamp: timestamp.to_string(),
    }))
}

async fn list_runs(State(state): State<SharedState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

// ── Tests ─────────────────────────────────────────────────────────────
