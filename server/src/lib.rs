use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use retrieval::store::Metadata;
use retrieval::{Document, Engine, EngineError, NewDocument};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Deserialize)]
pub struct DocumentInput {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentsInput {
    pub documents: Vec<DocumentInput>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponseItem {
    pub id: String,
    pub page_content: String,
    pub metadata: Metadata,
}

impl From<Document> for SearchResponseItem {
    fn from(doc: Document) -> Self {
        Self { id: doc.id, page_content: doc.content, metadata: doc.metadata }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResponseItem>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ids: None }
    }
}

/// Settings the HTTP layer needs beyond the engine itself.
#[derive(Debug, Clone, Default)]
pub struct AppSettings {
    /// When set, mutating routes require a matching `X-ADMIN-TOKEN` header.
    pub admin_token: Option<String>,
    /// Allowed CORS origins; empty means any.
    pub cors_origins: Vec<String>,
    pub request_timeout: Option<Duration>,
}

impl AppSettings {
    /// Read `ADMIN_TOKEN` and `CORS_ALLOW_ORIGIN` (comma-separated) from the environment.
    pub fn from_env(request_timeout: Duration) -> Self {
        let admin_token = std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty());
        let cors_origins = std::env::var("CORS_ALLOW_ORIGIN")
            .map(|val| val.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        Self { admin_token, cors_origins, request_timeout: Some(request_timeout) }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub settings: Arc<AppSettings>,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    ServiceUnavailable(String),
    Internal(String),
    /// An extractor refused the request; keeps the extractor's status.
    Rejected(StatusCode, String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound("Document not found.".into())
        } else if err.is_bad_request() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::ServiceUnavailable(err.to_string())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Rejected(status, msg) => (status, msg),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

pub fn build_app(engine: Arc<Engine>, settings: AppSettings) -> Router {
    let cors = if settings.cors_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<_> = settings.cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
    };
    let state = AppState { engine, settings: Arc::new(settings) };

    Router::new()
        .route("/", get(|| async { Json(serde_json::json!({ "status": "ok" })) }))
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/bm25/documents", axum::routing::post(add_documents))
        .route(
            "/api/v1/bm25/documents/:doc_id",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/api/v1/bm25/search", get(search_documents))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Run a synchronous engine call on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("engine task failed: {e}")))?
        .map_err(ApiError::from)
}

pub async fn add_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
    input: Result<Json<DocumentsInput>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    authorize(&state, &headers)?;
    let Json(input) = input?;
    let batch: Vec<NewDocument> = input
        .documents
        .into_iter()
        .map(|d| NewDocument { content: d.page_content, metadata: d.metadata, id: d.id })
        .collect();
    let engine = Arc::clone(&state.engine);
    let ids = run_blocking(move || engine.add_documents(batch)).await?;
    Ok(Json(MessageResponse { message: "Documents added successfully.".into(), ids: Some(ids) }))
}

pub async fn delete_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    authorize(&state, &headers)?;
    let engine = Arc::clone(&state.engine);
    let id = doc_id.clone();
    run_blocking(move || engine.remove_document(&id)).await?;
    Ok(Json(MessageResponse::new(format!("Document {doc_id} deleted successfully."))))
}

#[derive(Debug, Deserialize)]
pub struct UpdateInput {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

pub async fn update_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<String>,
    input: Result<Json<UpdateInput>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    authorize(&state, &headers)?;
    let Json(input) = input?;
    let engine = Arc::clone(&state.engine);
    let id = doc_id.clone();
    run_blocking(move || engine.update_document(&id, input.page_content, input.metadata)).await?;
    Ok(Json(MessageResponse::new(format!("Document {doc_id} updated successfully."))))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<SearchResponseItem>, ApiError> {
    state
        .engine
        .get(&doc_id)
        .map(|doc| Json(doc.into()))
        .ok_or_else(|| ApiError::NotFound("Document not found.".into()))
}

pub async fn search_documents(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params?;
    let start = Instant::now();
    let engine = Arc::clone(&state.engine);
    let deadline = state.settings.request_timeout.map(|t| start + t);
    let SearchParams { query, k } = params;
    let docs = run_blocking(move || match deadline {
        Some(deadline) => engine.search_until(&query, k, deadline),
        None => engine.search(&query, k),
    })
    .await?;
    tracing::debug!(hits = docs.len(), took_s = start.elapsed().as_secs_f64(), "search served");
    Ok(Json(SearchResponse { results: docs.into_iter().map(SearchResponseItem::from).collect() }))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(required) = &state.settings.admin_token else {
        return Ok(());
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("invalid admin token".into()))
    }
}

/// Resolves on ctrl-c, or on SIGTERM where the platform has it.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("ctrl-c received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
