#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt as _;
use papermill_core::app::{AppState, SharedState};
use papermill_core::config::{Config, ServerConfig};
use papermill_core::research::agents::researcher::PaperSearch;
use papermill_core::research::agents::writer::DraftWriter;
use papermill_core::research::Pipeline;
use papermill_core::sessions::SessionStore;
use papermill_types::Paper;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

/// Returns papers whose titles are derived from the query.
pub struct EchoSearch;

#[async_trait]
impl PaperSearch for EchoSearch {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<Paper>> {
        Ok((0..max_results.min(3))
            .map(|i| Paper {
                title: format!("{} study {}", query, i),
                authors: "Ada Lovelace, Alan Turing".into(),
                abstract_text: format!("We investigate {} from angle {}.", query, i),
                url: format!("http://arxiv.org/abs/0000.{:04}", i),
            })
            .collect())
    }
}

/// Never answers.
pub struct HangingSearch;

#[async_trait]
impl PaperSearch for HangingSearch {
    async fn search(&self, _query: &str, _max_results: usize) -> anyhow::Result<Vec<Paper>> {
        std::future::pending().await
    }
}

pub fn test_config() -> Config {
    Config {
        server: Some(ServerConfig { bind: None, stream_poll_ms: Some(20) }),
        ..Default::default()
    }
}

pub fn state_with(search: Arc<dyn PaperSearch>, dir: &tempfile::TempDir) -> SharedState {
    let pipeline = Pipeline::new(search, DraftWriter::Templated, SessionStore::new(dir.path()), 4000);
    AppState::with_pipeline(test_config(), pipeline).unwrap()
}

pub async fn send(router: &Router, req: Request<Body>) -> Response<Body> {
    router.clone().oneshot(req).await.unwrap()
}

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    send(router, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(router: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, req).await
}

pub async fn post_form(router: &Router, uri: &str, form: &str) -> Response<Body> {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    send(router, req).await
}

pub async fn body_string(resp: Response<Body>) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).to_string()
}

pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(resp).await).unwrap()
}

/// Polls `/api/status/:id` until the run leaves the running state.
pub async fn wait_finished(router: &Router, id: &str) -> serde_json::Value {
    for _ in 0..400 {
        let v = body_json(get(router, &format!("/api/status/{}", id)).await).await;
        if v["state"].as_str().map(|s| s != "running").unwrap_or(false) {
            return v;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("run {} did not finish", id);
}
