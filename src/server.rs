//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness, corpus counts, generator reachability |
//! | `POST` | `/ingest` | Multipart upload (field `file`); `?chunk_size=&overlap=` override the defaults |
//! | `POST` | `/query` | `{question, top_k?, temperature?}` → generated answer |
//! | `POST` | `/search` | `{query, top_k?}` → ranked chunks, no generation |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "top_k must be > 0" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request` | 400 |
//! | `timeout` | 408 |
//! | `retrieval_empty` | 409 |
//! | `payload_too_large` | 413 |
//! | `unsupported_format` | 415 |
//! | `corrupt_file` | 422 |
//! | `internal` | 500 |
//! | `generation_failure` | 502 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use lexrag_core::store::memory::InMemoryStore;
use lexrag_core::store::Store;

use crate::config::Config;
use crate::error::RagError;
use crate::extract::ExtractError;
use crate::generator::{create_generator, Generator};
use crate::ingest::{ingest_document, load_sample_document, IngestReport, IngestRequest};
use crate::rag::{QueryRequest, RagAnswer, RagEngine, RagSettings};

const DEFAULT_TEMPERATURE: f64 = 0.3;
/// Room for multipart framing on top of `ingest.max_file_bytes`.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    engine: Arc<RagEngine>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, generator: Arc<dyn Generator>) -> Self {
        let settings = RagSettings::from_config(&config);
        Self {
            config: Arc::new(config),
            engine: Arc::new(RagEngine::new(store, generator, settings)),
        }
    }

    pub fn engine(&self) -> &RagEngine {
        &self.engine
    }
}

/// Assemble the router without binding a socket.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state
        .config
        .ingest
        .max_file_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ingest", post(handle_ingest))
        .route("/query", post(handle_query))
        .route("/search", post(handle_search))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on `server.bind` and run until interrupted.
///
/// Loads `ingest.sample_document` (if any) before accepting requests.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    load_sample_document(store.as_ref(), config);

    let generator: Arc<dyn Generator> = Arc::from(create_generator(&config.generator)?);
    let bind_addr = config.server.bind.clone();
    let app = build_router(AppState::new(config.clone(), store, generator));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        addr = %bind_addr,
        model = %config.generator.model,
        generator = %config.generator.provider,
        "lexrag listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "request failed");
        } else {
            tracing::debug!(code = %self.code, message = %self.message, "request rejected");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::Configuration(_) => StatusCode::BAD_REQUEST,
            RagError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RagError::Extraction(ExtractError::UnsupportedFormat(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            RagError::Extraction(ExtractError::CorruptFile { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            RagError::RetrievalEmpty => StatusCode::CONFLICT,
            RagError::GenerationFailure { .. } => StatusCode::BAD_GATEWAY,
        };
        AppError::new(status, err.code(), err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store_initialized: bool,
    chunks_stored: usize,
    documents_stored: usize,
    /// `connected`, `disconnected`, or `disabled`.
    generator: &'static str,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.engine.store();
    let generator = if !state.config.generator.is_enabled() {
        "disabled"
    } else if state.engine.generator().is_reachable().await {
        "connected"
    } else {
        "disconnected"
    };

    Json(HealthResponse {
        status: "ok",
        store_initialized: true,
        chunks_stored: store.size(),
        documents_stored: store.document_count(),
        generator,
    })
}

// ============ POST /ingest ============

#[derive(Debug, Deserialize)]
struct IngestParams {
    chunk_size: Option<usize>,
    overlap: Option<usize>,
}

async fn handle_ingest(
    State(state): State<AppState>,
    params: Result<Query<IngestParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IngestReport>, AppError> {
    let Query(params) = params?;
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, content_type, bytes));
        break;
    }
    let (file_name, content_type, bytes) =
        upload.ok_or_else(|| bad_request("multipart field 'file' is required"))?;

    let request = IngestRequest {
        bytes: bytes.to_vec(),
        content_type,
        file_name,
        chunk_size: params.chunk_size.unwrap_or(state.config.chunking.chunk_size),
        overlap: params.overlap.unwrap_or(state.config.chunking.overlap),
    };
    let limit = state.config.ingest.max_file_bytes;
    let engine = state.engine.clone();

    // Extraction is CPU-bound; keep it off the async workers.
    let report = tokio::task::spawn_blocking(move || {
        ingest_document(engine.store().as_ref(), request, limit)
    })
    .await
    .map_err(|e| AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()))??;

    Ok(Json(report))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", err.body_text())
    } else {
        bad_request(err.body_text())
    }
}

// ============ POST /query ============

#[derive(Debug, Deserialize)]
struct QueryBody {
    question: String,
    top_k: Option<usize>,
    temperature: Option<f64>,
}

async fn handle_query(
    State(state): State<AppState>,
    body: Result<Json<QueryBody>, JsonRejection>,
) -> Result<Json<RagAnswer>, AppError> {
    let Json(body) = body?;
    let request = QueryRequest::new(
        body.question,
        body.top_k.unwrap_or(state.config.retrieval.default_top_k),
        body.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        state.config.retrieval.max_top_k,
    )
    .map_err(RagError::from)?;

    let deadline = Duration::from_secs(state.config.server.request_timeout_secs);
    match tokio::time::timeout(deadline, state.engine.answer(&request)).await {
        Ok(answer) => Ok(Json(answer?)),
        Err(_) => Err(AppError::new(
            StatusCode::REQUEST_TIMEOUT,
            "timeout",
            format!("query exceeded {}s", deadline.as_secs()),
        )),
    }
}

// ============ POST /search ============

#[derive(Debug, Deserialize)]
struct SearchBody {
    query: String,
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct SearchHit {
    chunk_id: u64,
    document_id: String,
    sequence_index: usize,
    start_offset: usize,
    end_offset: usize,
    score: f64,
    text: String,
}

#[derive(Serialize)]
struct SearchResponse {
    hits: Vec<SearchHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(body) = body?;
    if body.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let top_k = body.top_k.unwrap_or(state.config.retrieval.default_top_k);
    let result = state.engine.search(&body.query, top_k)?;

    let hits = result
        .iter()
        .map(|hit| SearchHit {
            chunk_id: hit.chunk.id,
            document_id: hit.chunk.document_id.clone(),
            sequence_index: hit.chunk.sequence_index,
            start_offset: hit.chunk.start_offset,
            end_offset: hit.chunk.end_offset,
            score: hit.score,
            text: hit.chunk.text.clone(),
        })
        .collect();
    Ok(Json(SearchResponse { hits }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::DisabledGenerator;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let mut config = Config::minimal();
        config.generator.provider = "disabled".to_string();
        build_router(AppState::new(
            config,
            Arc::new(InMemoryStore::new()),
            Arc::new(DisabledGenerator),
        ))
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_on_empty_store() {
        let resp = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store_initialized"], true);
        assert_eq!(body["chunks_stored"], 0);
        assert_eq!(body["generator"], "disabled");
    }

    #[tokio::test]
    async fn query_on_empty_store_is_conflict() {
        let resp = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"question":"anything?"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(resp).await["error"]["code"], "retrieval_empty");
    }

    #[tokio::test]
    async fn malformed_json_uses_error_contract() {
        let resp = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn blank_search_query_is_bad_request() {
        let resp = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/search")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query":"   "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ingest_without_multipart_uses_error_contract() {
        let resp = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ingest")
                    .header("content-type", "text/plain")
                    .body(Body::from("just text"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(!body["error"]["message"].as_str().unwrap().is_empty());
    }

    #[test]
    fn rag_errors_map_to_statuses() {
        let cases = [
            (RagError::RetrievalEmpty, StatusCode::CONFLICT),
            (
                RagError::FileTooLarge { size: 2, limit: 1 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                RagError::from(ExtractError::UnsupportedFormat("image/png".into())),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                RagError::GenerationFailure {
                    attempts: 3,
                    source: crate::generator::GenerateError::Timeout,
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }
}
