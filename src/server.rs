//! HTTP question-answering service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer `{q, k?, mode?}` with contexts and citations |
//! | `GET`  | `/health` | Liveness plus index load state |
//! | `GET`  | `/stats` | Corpus and index sizes |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query cannot be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500). A body that is not
//! valid JSON or does not match `{q, k?, mode?}` is a `bad_request` too.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use docqa_core::engine::{QueryEngine, QueryError, QueryRequest};
use docqa_core::models::QueryResponse;

use crate::config::Config;
use crate::db;
use crate::retriever::{load_serving_engine, LoadedEngine};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<QueryEngine>,
    default_k: i64,
    embedding_model: Arc<str>,
    total_passages: usize,
}

impl AppState {
    pub fn new(config: &Config, loaded: LoadedEngine) -> Self {
        Self {
            engine: Arc::new(loaded.engine),
            default_k: config.retrieval.default_k,
            embedding_model: loaded.embedding_model.into(),
            total_passages: loaded.total_passages,
        }
    }
}

/// Build the router with CORS applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .layer(cors)
        .with_state(state)
}

/// Load indexes and serve on `[server].bind` until the process exits.
///
/// Fails before binding when the store holds no embedded passages.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let loaded = load_serving_engine(config, &pool).await?;
    pool.close().await;

    let app = router(AppState::new(config, loaded));
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "docqa server listening");
    eprintln!("docqa server listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: rejection.body_text(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: format!("Internal server error: {:#}", err),
        }
    }
}

// ============ POST /ask ============

#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub q: String,
    #[serde(default)]
    pub k: Option<i64>,
    #[serde(default)]
    pub mode: Option<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    body: Result<Json<AskBody>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(body) = body?;
    let request = QueryRequest::new(
        &body.q,
        body.k.unwrap_or(state.default_k),
        body.mode.as_deref().unwrap_or("baseline"),
    )?;
    let response = state.engine.ask(&request).await?;
    Ok(Json(response))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    vector_index_loaded: bool,
    lexical_index_loaded: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.engine.status();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        vector_index_loaded: status.vector_index_loaded(),
        lexical_index_loaded: status.lexical_index_loaded(),
    })
}

// ============ GET /stats ============

#[derive(Serialize)]
struct StatsResponse {
    total_passages: usize,
    vector_index_size: usize,
    lexical_corpus_size: usize,
    embedding_model: String,
    reranker_type: &'static str,
}

async fn handle_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let status = state.engine.status();
    Json(StatsResponse {
        total_passages: state.total_passages,
        vector_index_size: status.vector_index_size,
        lexical_corpus_size: status.lexical_corpus_size,
        embedding_model: state.embedding_model.to_string(),
        reranker_type: "hybrid",
    })
}
