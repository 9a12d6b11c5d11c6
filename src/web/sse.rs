//! `/api/analyze`: start a run and stream its progress as server-sent events.
//!
//! Each [`ProgressEvent`] becomes one `data:` frame holding its JSON. The
//! stream ends right after the terminal event. A client that goes away only
//! stops delivery; the run itself is on its own task and finishes anyway.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use serde::Deserialize;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use super::api::{ApiError, SharedState};
use crate::models::ProgressEvent;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub sitemap_url: Option<String>,
}

/// Accepts the sitemap URL from the query string (GET) or a JSON body (POST).
pub async fn analyze(
    State(state): State<SharedState>,
    Query(query): Query<AnalyzeRequest>,
    body: Option<Json<AnalyzeRequest>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let sitemap_url = query
        .sitemap_url
        .or_else(|| body.and_then(|Json(req)| req.sitemap_url))
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Sitemap URL is required".into()))?;

    info!(sitemap = %sitemap_url, "run submitted");
    let receiver = state.orchestrator.spawn(sitemap_url);
    let stream = receiver
        .into_stream()
        .map(|event| Ok::<_, Infallible>(to_sse_event(&event)));

    Ok(Sse::new(stream).keep_alive(default_keep_alive()))
}

fn to_sse_event(event: &ProgressEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|err| {
        warn!("failed to encode progress event: {err}");
        Event::default().data(r#"{"error":true,"message":"unencodable progress event"}"#)
    })
}

fn default_keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(15))
        .text("keep-alive")
}

#[cfg(test)]
mod tests {
    use crate::engine::testing::{Script, ScriptedEngine};
    use crate::web::api::{api_router, tests::test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::{Router, routing::get};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn serve_sitemap(body: &'static str) -> String {
        let router = Router::new().route("/sitemap.xml", get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/sitemap.xml", addr)
    }

    /// Parse every `data:` frame of an SSE body into JSON.
    fn data_frames(body: &str) -> Vec<serde_json::Value> {
        body.split("\n\n")
            .filter_map(|frame| {
                frame
                    .lines()
                    .find_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
            })
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    async fn stream_body(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        if status == StatusCode::OK {
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "text/event-stream"
            );
        }
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_missing_sitemap_url_is_400() {
        let dir = TempDir::new().unwrap();
        let app = api_router().with_state(test_state(&dir, ScriptedEngine::new()));
        let request = Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"sitemapUrl": "  "}"#))
            .unwrap();
        let (status, body) = stream_body(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Sitemap URL is required"));
    }

    #[tokio::test]
    async fn test_post_streams_progress_until_completion() {
        let dir = TempDir::new().unwrap();
        let sitemap = serve_sitemap(
            "<urlset><url><loc>https://s/a</loc></url><url><loc>https://s/b</loc></url></urlset>",
        )
        .await;
        let engine = ScriptedEngine::new().script("https://s/b", Script::AuditFails);
        let state = test_state(&dir, engine);
        let app = api_router().with_state(state.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "sitemapUrl": sitemap }).to_string(),
            ))
            .unwrap();
        let (status, body) = stream_body(app, request).await;
        assert_eq!(status, StatusCode::OK);

        let frames = data_frames(&body);
        assert_eq!(frames.len(), 4, "body was: {}", body);
        assert_eq!(frames[0], serde_json::json!({"progress": 0.0, "total": 2, "message": "starting"}));
        assert_eq!(frames[1]["progress"], 50.0);
        assert_eq!(frames[1]["message"], "Analyzed https://s/a");
        assert_eq!(frames[2]["message"], "Failed to analyze https://s/b");
        assert_eq!(frames[3]["progress"], 100.0);
        assert_eq!(frames[3]["sitemapUrl"], sitemap.as_str());

        let timestamp = frames[3]["timestamp"].as_str().unwrap();
        let runs = state.store.list().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].ends_with(timestamp));
    }

    #[tokio::test]
    async fn test_get_with_query_reports_fetch_failure() {
        let dir = TempDir::new().unwrap();
        let app = api_router().with_state(test_state(&dir, ScriptedEngine::new()));
        let request = Request::builder()
            .uri("/api/analyze?sitemapUrl=http%3A%2F%2F127.0.0.1%3A1%2Fsitemap.xml")
            .body(Body::empty())
            .unwrap();
        let (status, body) = stream_body(app, request).await;
        assert_eq!(status, StatusCode::OK);

        let frames = data_frames(&body);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["error"], true);
        assert!(
            frames[0]["message"]
                .as_str()
                .unwrap()
                .starts_with("Failed to fetch sitemap")
        );
    }
}
