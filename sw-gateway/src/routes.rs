//! HTTP handlers: the thin adapter between transport and the core.
//!
//! Every handler delegates to the chat service or the ingestion pipeline;
//! no retrieval or generation logic lives here.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use studyweave::{AgentError, AppConfig, ChatService, TurnEvent};
use sw_corpus::{DocumentInput, FileOutcome, IngestionPipeline, Retriever, VectorIndex};

use crate::webpages::{self, FetchedPage};

/// Shared service handles, constructed once at startup and cloned per
/// request.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub pipeline: Arc<IngestionPipeline>,
    pub retriever: Arc<Retriever>,
    pub index: Arc<dyn VectorIndex>,
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/upload-pdf", post(upload_pdf))
        .route("/process-webpages", post(process_webpages))
        .route("/query", post(query))
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
        .route("/chat/history/{id}", get(chat_history))
        .route("/chat/clear/{id}", delete(chat_clear))
        .route("/clear-vector-store", delete(clear_vector_store))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        let message = err.to_string();
        match err {
            AgentError::SessionNotFound { .. } => ApiError::NotFound(message),
            _ => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "status": "error", "message": self.to_string() }));
        (status, body).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<StatusResponse>, ApiError> {
    let mut inputs = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let source = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "upload.pdf".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        inputs.push(DocumentInput::File {
            source,
            bytes: bytes.to_vec(),
        });
    }
    if inputs.is_empty() {
        return Err(ApiError::BadRequest("no files in request".to_string()));
    }

    tracing::info!(files = inputs.len(), "upload received");
    let report = state.pipeline.run(inputs).await;
    if report.all_failed() {
        return Err(ApiError::BadRequest(
            "no content could be extracted from the uploaded files".to_string(),
        ));
    }

    let filenames: Vec<String> = report.outcomes.iter().map(|o| o.source.clone()).collect();
    Ok(Json(StatusResponse {
        status: "success",
        message: "files processed".to_string(),
        details: Some(json!({
            "files_processed": report.files_processed(),
            "total_chunks": report.total_chunks(),
            "filenames": filenames,
            "outcomes": &report.outcomes,
        })),
    }))
}

#[derive(Debug, Deserialize)]
struct WebPagesRequest {
    urls: Vec<String>,
}

async fn process_webpages(
    State(state): State<AppState>,
    Json(request): Json<WebPagesRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    if request.urls.is_empty() {
        return Err(ApiError::BadRequest("no urls in request".to_string()));
    }

    let mut inputs = Vec::new();
    let mut failures: Vec<FileOutcome> = Vec::new();
    for page in webpages::fetch_all(&state.http, &request.urls).await {
        match page {
            FetchedPage::Ok { source, html } => inputs.push(DocumentInput::Html { source, html }),
            FetchedPage::Failed { source, error } => failures.push(FileOutcome {
                source,
                pages: 0,
                chunks_added: 0,
                ocr_used: false,
                error: Some(error),
            }),
        }
    }

    let mut report = state.pipeline.run(inputs).await;
    report.outcomes.extend(failures);
    if report.all_failed() {
        return Err(ApiError::BadRequest(
            "no webpage could be processed".to_string(),
        ));
    }

    let filenames: Vec<String> = report.outcomes.iter().map(|o| o.source.clone()).collect();
    Ok(Json(StatusResponse {
        status: "success",
        message: "webpages processed".to_string(),
        details: Some(json!({
            "files_processed": report.files_processed(),
            "total_chunks": report.total_chunks(),
            "filenames": filenames,
            "outcomes": &report.outcomes,
        })),
    }))
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
    k: Option<usize>,
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let k = request.k.unwrap_or(state.config.default_search_k);
    let hits = state
        .retriever
        .search_by_text(&request.query, k, None)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(Json(
        hits.into_iter()
            .map(|hit| {
                json!({
                    "content": hit.chunk.text,
                    "metadata": hit.chunk.metadata,
                })
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    session_id: Option<String>,
    use_rag: Option<bool>,
}

impl ChatRequest {
    /// An unparsable or unknown session id means "start a new session",
    /// matching the session manager's create-on-unknown behavior.
    fn session_uuid(&self) -> Option<Uuid> {
        self.session_id.as_deref().and_then(|id| id.parse().ok())
    }
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let use_rag = request.use_rag.unwrap_or(true);
    let session_uuid = request.session_uuid();
    let outcome = state
        .chat
        .chat(request.message, session_uuid, use_rag)
        .await?;

    Ok(Json(json!({
        "response": outcome.response,
        "session_id": outcome.session_id,
        "sources": outcome.sources,
    })))
}

async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl futures_util::Stream<Item = Result<SseEvent, Infallible>>> {
    let use_rag = request.use_rag.unwrap_or(true);
    let session_uuid = request.session_uuid();
    let (session_id, mut turn) = state.chat.chat_stream(request.message, session_uuid, use_rag);
    tracing::debug!(session = %session_id, "streaming turn started");

    let sse_stream = stream! {
        while let Some(event) = turn.next().await {
            let terminal = matches!(event, TurnEvent::Done | TurnEvent::Error { .. });
            yield Ok(SseEvent::default()
                .json_data(&event)
                .expect("turn events always serialize"));
            if terminal {
                break;
            }
        }
    };

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

async fn chat_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session_id: Uuid = id
        .parse()
        .map_err(|_| ApiError::NotFound(format!("session not found: {id}")))?;
    let messages = state.chat.history(session_id).await?;
    Ok(Json(json!({ "messages": messages })))
}

async fn chat_clear(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session_id: Uuid = id
        .parse()
        .map_err(|_| ApiError::NotFound(format!("session not found: {id}")))?;
    state.chat.clear(session_id)?;
    Ok(Json(json!({ "cleared": true })))
}

async fn clear_vector_store(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state
        .index
        .delete_all()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    tracing::info!(removed, "vector store cleared");
    Ok(Json(json!({ "removed": removed })))
}
