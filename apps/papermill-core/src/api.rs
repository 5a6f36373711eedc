use axum::{
    extract::{Form, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::SharedState;
use crate::config::clamp_max_results;
use crate::research::RunRequest;
use crate::runlog::LogTail;
use crate::runs::{runtime, RunState};
use crate::sessions::SessionId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DONE_SENTINEL: &str = "__DONE__";
pub const ABORTED_SENTINEL: &str = "__ABORTED__";

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/run", post(run_form))
        .route("/status/:id", get(status_page))
        .route("/stream/:id", get(stream_log))
        .route("/result/:id", get(result_page))
        .route("/api/run", post(api_run))
        .route("/api/run/:id/cancel", post(api_cancel))
        .route("/api/session/:id", get(api_session))
        .route("/api/status/:id", get(api_status))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

fn error_json(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({"error": msg}))).into_response()
}

fn html_page(page: Result<String, handlebars::RenderError>) -> Response {
    match page {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "page render failed");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "failed to render page")
        }
    }
}

fn parse_id(raw: &str) -> Result<SessionId, Response> {
    SessionId::parse(raw).map_err(|_| error_json(StatusCode::BAD_REQUEST, "invalid session id"))
}

/// Registers and spawns a run. Shared by the form and JSON entry points.
fn start_run(state: &SharedState, title: &str, session_id: Option<&str>, max_results: Option<usize>) -> Result<SessionId, Response> {
    let id = match session_id.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_id(raw)?,
        None => SessionId::from_clock(),
    };
    let default_max = state.config.read().default_max_results();
    let req = RunRequest {
        title: title.trim().to_string(),
        session_id: id.clone(),
        max_results: max_results.map(clamp_max_results).unwrap_or(default_max),
    };
    let cancel = state.runs.begin(&id).map_err(|e| error_json(StatusCode::CONFLICT, &e.to_string()))?;
    tracing::info!(session_id = %id, title = %req.title, max_results = req.max_results, "starting run");
    runtime::spawn(state.clone(), req, cancel).map_err(|e| {
        tracing::error!(session_id = %id, error = %e, "failed to spawn run thread");
        error_json(StatusCode::INTERNAL_SERVER_ERROR, "failed to start run")
    })?;
    Ok(id)
}

async fn index(State(state): State<SharedState>) -> Response {
    papermill_telemetry::inc_api_request("/");
    let default_max = state.config.read().default_max_results();
    html_page(state.pages.index(default_max))
}

#[derive(Deserialize)]
struct RunForm {
    title: Option<String>,
    session_id: Option<String>,
    max_results: Option<String>,
}

async fn run_form(State(state): State<SharedState>, Form(form): Form<RunForm>) -> Response {
    papermill_telemetry::inc_api_request("/run");
    let title = match form.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return Redirect::to("/").into_response(),
    };
    let max_results = form.max_results.as_deref().and_then(|s| s.trim().parse::<usize>().ok());
    match start_run(&state, &title, form.session_id.as_deref(), max_results) {
        Ok(id) => Redirect::to(&format!("/status/{}", id)).into_response(),
        Err(resp) => resp,
    }
}

#[derive(Deserialize)]
struct ApiRunReq {
    title: Option<String>,
    session_id: Option<String>,
    max_results: Option<usize>,
}

async fn api_run(State(state): State<SharedState>, Json(req): Json<ApiRunReq>) -> Response {
    papermill_telemetry::inc_api_request("/api/run");
    let title = match req.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return error_json(StatusCode::BAD_REQUEST, "missing title"),
    };
    match start_run(&state, &title, req.session_id.as_deref(), req.max_results) {
        Ok(id) => Json(json!({"session_id": id})).into_response(),
        Err(resp) => resp,
    }
}

async fn status_page(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    papermill_telemetry::inc_api_request("/status/:id");
    match parse_id(&id) {
        Ok(id) => html_page(state.pages.status(&id)),
        Err(resp) => resp,
    }
}

async fn result_page(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    papermill_telemetry::inc_api_request("/result/:id");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.store.load(&id).await {
        Ok(Some(session)) => html_page(state.pages.result(&id, &session)),
        Ok(None) => Redirect::to(&format!("/status/{}", id)).into_response(),
        Err(e) => {
            tracing::error!(session_id = %id, error = %e, "failed to load session");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "failed to load session")
        }
    }
}

/// Server-sent events: one `data:` event per run-log line, then a sentinel
/// once the run is over.
async fn stream_log(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    papermill_telemetry::inc_api_request("/stream/:id");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let (rx, _task) = spawn_log_stream(state, id);
    let stream = tokio_stream::wrappers::ReceiverStream::new(rx)
        .map(|chunk| Ok::<_, std::convert::Infallible>(axum::body::Bytes::from(chunk)));
    (
        [(header::CONTENT_TYPE, "text/event-stream"), (header::CACHE_CONTROL, "no-cache")],
        axum::body::Body::from_stream(stream),
    )
        .into_response()
}

/// Polls the run log of `id` and yields SSE frames. The task ends after the
/// sentinel or as soon as the receiver is dropped.
pub fn spawn_log_stream(state: SharedState, id: SessionId) -> (mpsc::Receiver<String>, JoinHandle<()>) {
    let poll = state.config.read().stream_poll();
    let (tx, rx) = mpsc::channel::<String>(64);
    let task = tokio::spawn(async move {
        let mut tail = LogTail::new(state.store.log_path(&id));
        while !tx.is_closed() {
            // decided before reading so every line written up to the end is sent
            let sentinel = match state.runs.state(&id) {
                Some(RunState::Running) => None,
                Some(RunState::Cancelled | RunState::Failed) => Some(ABORTED_SENTINEL),
                _ => state.store.exists(&id).await.then_some(DONE_SENTINEL),
            };

            let lines = match tail.read_new_lines().await {
                Ok(lines) => lines,
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "log tail failed");
                    vec![]
                }
            };
            for line in lines {
                if tx.send(format!("data: {}\n\n", line)).await.is_err() {
                    return;
                }
            }
            if let Some(sentinel) = sentinel {
                if let Some(rest) = tail.take_partial() {
                    let _ = tx.send(format!("data: {}\n\n", rest)).await;
                }
                let _ = tx.send(format!("data: {}\n\n", sentinel)).await;
                return;
            }
            tokio::select! {
                _ = tx.closed() => {}
                _ = tokio::time::sleep(poll) => {}
            }
        }
        tracing::debug!(session_id = %id, "log stream client went away");
    });
    (rx, task)
}

async fn api_session(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    papermill_telemetry::inc_api_request("/api/session/:id");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.store.load(&id).await {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "session not found"),
        Err(e) => {
            tracing::error!(session_id = %id, error = %e, "failed to load session");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "failed to load session")
        }
    }
}

#[derive(Serialize)]
struct RunStatus {
    session_id: SessionId,
    /// `None` for runs this process did not start.
    state: Option<RunState>,
    has_result: bool,
    has_log: bool,
}

async fn api_status(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    papermill_telemetry::inc_api_request("/api/status/:id");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let body = RunStatus {
        state: state.runs.state(&id),
        has_result: state.store.exists(&id).await,
        has_log: state.store.has_log(&id).await,
        session_id: id,
    };
    Json(body).into_response()
}

async fn api_cancel(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    papermill_telemetry::inc_api_request("/api/run/:id/cancel");
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if state.runs.cancel(&id) {
        tracing::info!(session_id = %id, "cancellation requested");
        (StatusCode::ACCEPTED, Json(json!({"session_id": id, "cancelled": true}))).into_response()
    } else {
        error_json(StatusCode::NOT_FOUND, "no active run")
    }
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    papermill_telemetry::inc_api_request("/health");
    Json(Health { status: "ok", version: state.version })
}

async fn metrics() -> impl IntoResponse {
    papermill_telemetry::inc_api_request("/metrics");
    let body = papermill_telemetry::gather_prometheus();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
