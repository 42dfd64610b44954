//! HTTP surface for the document summarizer.
//!
//! - `GET /` – Welcome message.
//! - `POST /upload` – Multipart upload (field `file`); stores the PDF and returns its id.
//! - `GET /documents` – Uploaded documents in upload order.
//! - `DELETE /documents/:id` – Remove an uploaded document and its file.
//! - `GET /summary/:id` – Summarize a single uploaded document.
//! - `POST /chat` – Summarize every PDF in the upload directory. The `message` is only logged.
//! - `GET /metrics` – Pipeline counters.
//!
//! Errors are returned as `{"error": "<message>"}`. CORS is permissive so a browser front-end
//! served from another origin can call the API.

use crate::documents::{DocumentError, StoredDocument, UploadStore};
use crate::metrics::MetricsSnapshot;
use crate::processing::SummarizeApi;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

/// Shared handles passed to every handler.
struct AppState<S> {
    service: Arc<S>,
    store: Arc<UploadStore>,
}

// Derived Clone would require `S: Clone`.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            store: Arc::clone(&self.store),
        }
    }
}

/// Build the HTTP router exposing the summarizer API.
pub fn create_router<S>(
    service: Arc<S>,
    store: Arc<UploadStore>,
    max_upload_bytes: usize,
) -> Router
where
    S: SummarizeApi + 'static,
{
    Router::new()
        .route("/", get(home))
        .route("/upload", post(upload_file::<S>))
        .route("/documents", get(list_documents::<S>))
        .route("/documents/:id", delete(delete_document::<S>))
        .route("/summary/:id", get(summarize_document::<S>))
        .route("/chat", post(chat::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(AppState { service, store })
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

async fn home() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Welcome to the Document Summarizer API",
    })
}

/// Response body for `POST /upload`.
#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    id: Uuid,
    filename: String,
}

/// Store the multipart field `file` in the upload directory.
///
/// The first `file` field wins; other fields are ignored. The saved name is the base name of
/// the client-supplied filename, so a later upload with the same name replaces the file.
async fn upload_file<S>(
    State(state): State<AppState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError>
where
    S: SummarizeApi,
{
    let mut multipart = multipart.map_err(|rejection| {
        tracing::warn!(error = %rejection, "Upload request is not multipart");
        AppError::BadRequest("No file uploaded")
    })?;

    while let Some(field) = multipart.next_field().await.map_err(AppError::Multipart)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.trim().is_empty() {
            return Err(AppError::BadRequest("No selected file"));
        }
        let bytes = field.bytes().await.map_err(AppError::Multipart)?;

        let document = state
            .store
            .save(&filename, &bytes)
            .await
            .map_err(|error| match error {
                DocumentError::InvalidFilename(_) => AppError::BadRequest("No selected file"),
                other => AppError::internal("Failed to save file", other),
            })?;
        return Ok(Json(UploadResponse {
            message: "File uploaded successfully",
            id: document.id,
            filename: document.filename,
        }));
    }

    Err(AppError::BadRequest("No file uploaded"))
}

/// Response body for `GET /documents`.
#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<StoredDocument>,
}

async fn list_documents<S>(State(state): State<AppState<S>>) -> Json<DocumentsResponse>
where
    S: SummarizeApi,
{
    Json(DocumentsResponse {
        documents: state.store.list().await,
    })
}

async fn delete_document<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError>
where
    S: SummarizeApi,
{
    let id = parse_id(&id)?;
    state
        .store
        .delete(id)
        .await
        .map_err(|error| document_error(error, "Failed to delete file"))?;
    Ok(Json(MessageResponse {
        message: "Document deleted successfully",
    }))
}

/// Response body for `GET /summary/:id`.
#[derive(Serialize)]
struct SummaryResponse {
    id: Uuid,
    filename: String,
    summary: String,
}

async fn summarize_document<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, AppError>
where
    S: SummarizeApi,
{
    let id = parse_id(&id)?;
    let (document, path) = state
        .store
        .locate(id)
        .await
        .map_err(|error| document_error(error, "Failed to summarize document"))?;
    let outcome = state
        .service
        .summarize_files(vec![path])
        .await
        .map_err(|error| AppError::internal("Failed to summarize document", error))?;
    Ok(Json(SummaryResponse {
        id: document.id,
        filename: document.filename,
        summary: outcome.summary,
    }))
}

/// Request body for `POST /chat`.
#[derive(Deserialize, Default)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

/// Response body for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

/// Summarize the whole upload directory. A missing or unparsable body counts as an empty message.
async fn chat<S>(
    State(state): State<AppState<S>>,
    payload: Option<Json<ChatRequest>>,
) -> Result<Json<ChatResponse>, AppError>
where
    S: SummarizeApi,
{
    let Json(request) = payload.unwrap_or_default();
    tracing::info!(message = %request.message, "Received chat message");
    let outcome = state
        .service
        .summarize_directory(state.store.root())
        .await
        .map_err(|error| AppError::internal("Failed to generate summary", error))?;
    Ok(Json(ChatResponse {
        response: outcome.summary,
    }))
}

async fn get_metrics<S>(State(state): State<AppState<S>>) -> Json<MetricsSnapshot>
where
    S: SummarizeApi,
{
    Json(state.service.metrics_snapshot())
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Document not found"))
}

fn document_error(error: DocumentError, failure: &'static str) -> AppError {
    match error {
        DocumentError::NotFound(_) => AppError::NotFound("Document not found"),
        DocumentError::FileMissing(_) => AppError::NotFound("File not found"),
        DocumentError::InvalidFilename(_) => AppError::BadRequest("No selected file"),
        io @ DocumentError::Io { .. } => AppError::internal(failure, io),
    }
}

/// Handler failure rendered as `{"error": message}`.
enum AppError {
    BadRequest(&'static str),
    NotFound(&'static str),
    Multipart(MultipartError),
    Internal(&'static str),
}

impl AppError {
    /// Log the full error and return a generic 500.
    fn internal(message: &'static str, error: impl Into<anyhow::Error>) -> Self {
        let error = error.into();
        tracing::error!(error = ?error, "{message}");
        Self::Internal(message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.to_string()),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string()),
            Self::Multipart(error) => {
                tracing::warn!(error = %error, "Failed to read multipart body");
                (error.status(), error.body_text())
            }
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
