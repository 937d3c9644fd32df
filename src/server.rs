//! HTTP server for the chatbot.
//!
//! The server is started only after the pipeline is Ready, so every request
//! sees the same frozen index.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Plain-text banner |
//! | `GET`  | `/health` | Status, version, chunk count, and vector dimensions |
//! | `POST` | `/ask` | Answer a question from retrieved context |
//!
//! # Error Contract
//!
//! ```json
//! {
//!   "error": {
//!     "code": "bad_request",
//!     "message": "query must not be empty",
//!     "retryable": false
//!   }
//! }
//! ```
//!
//! `retryable` is true when the same request may succeed later (rate
//! limits, timeouts, network failures, index not yet built).
//!
//! | Code | Status | Cause |
//! |------|--------|-------|
//! | `bad_request` | 400 | missing, empty, or malformed query |
//! | `rate_limited` | 429 | provider throttled the query embedding |
//! | `internal` | 500 | anything unexpected |
//! | `provider_error` | 502 | auth, network, provider, or synthesis failure |
//! | `not_ready` | 503 | index not built |
//! | `timeout` | 504 | provider did not answer in time |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted for browser clients.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use merchant_insights_core::embedding::Embedder;
use merchant_insights_core::{EmbeddingError, Pipeline, RetrievalError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::commands::build_pipeline;
use crate::config::Config;
use crate::embedding::OpenAIEmbedder;
use crate::synthesize::{AnswerSynthesizer, OpenAIChatSynthesizer};

pub const BANNER: &str = "Merchant Insights Chatbot is running!";

/// Shared state handed to every handler.
pub struct AppState<E: Embedder> {
    pub pipeline: Arc<Pipeline<E>>,
    pub synthesizer: Arc<dyn AnswerSynthesizer>,
    /// Default `k` when a request does not set one.
    pub top_k: usize,
    pub ready_since: DateTime<Utc>,
}

impl<E: Embedder> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            synthesizer: self.synthesizer.clone(),
            top_k: self.top_k,
            ready_since: self.ready_since,
        }
    }
}

/// Build the index, then serve on `[server].bind` until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let embedder = OpenAIEmbedder::from_config(config)?;
    let synthesizer = OpenAIChatSynthesizer::from_config(config)?;
    let pipeline = build_pipeline(config, embedder).await?;

    let state = AppState {
        pipeline: Arc::new(pipeline),
        synthesizer: Arc::new(synthesizer),
        top_k: config.retrieval.top_k,
        ready_since: Utc::now(),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "listening");
    println!("Merchant Insights listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Routes with CORS applied.
pub fn router<E: Embedder + 'static>(state: AppState<E>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health::<E>))
        .route("/ask", post(handle_ask::<E>))
        .layer(cors)
        .with_state(state)
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
    retryable: bool,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    retryable: bool,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retryable: false,
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    fn provider(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "provider_error", message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                retryable: self.retryable,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Map a query-time failure to its HTTP category.
impl From<RetrievalError> for AppError {
    fn from(err: RetrievalError) -> Self {
        let message = err.to_string();
        let retryable = err.is_retryable();
        let mapped = match &err {
            RetrievalError::EmptyQuery => Self::bad_request(message),
            RetrievalError::IndexNotReady => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "not_ready", message)
            }
            RetrievalError::Embedding(EmbeddingError::RateLimited(_)) => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "rate_limited", message)
            }
            RetrievalError::Embedding(EmbeddingError::Timeout(_)) => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, "timeout", message)
            }
            RetrievalError::Embedding(EmbeddingError::EmptyInput) => Self::bad_request(message),
            RetrievalError::Embedding(_) | RetrievalError::Index(_) => Self::provider(message),
            RetrievalError::SourceRead(_) | RetrievalError::AlreadyBuilt => {
                Self::internal(message)
            }
        };
        Self { retryable, ..mapped }
    }
}

// ============ GET / ============

async fn handle_index() -> &'static str {
    BANNER
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    chunks: usize,
    /// Vector dimensions of the built index.
    dims: Option<usize>,
    ready_since: DateTime<Utc>,
}

async fn handle_health<E: Embedder + 'static>(
    State(state): State<AppState<E>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.pipeline.is_ready() { "ok" } else { "building" },
        version: env!("CARGO_PKG_VERSION"),
        chunks: state.pipeline.len(),
        dims: state
            .pipeline
            .knowledge_base()
            .ok()
            .map(|kb| kb.index().dims()),
        ready_since: state.ready_since,
    })
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

/// Retrieve the nearest chunks and synthesize an answer.
async fn handle_ask<E: Embedder + 'static>(
    State(state): State<AppState<E>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    let query = req
        .query
        .ok_or_else(|| AppError::bad_request("query is required"))?;
    let k = req.k.unwrap_or(state.top_k);
    if k == 0 {
        return Err(AppError::bad_request("k must be >= 1"));
    }

    let context = state.pipeline.retrieve(&query, k).await.map_err(|e| {
        if !matches!(e, RetrievalError::EmptyQuery) {
            warn!(error = %e, "retrieval failed");
        }
        AppError::from(e)
    })?;

    let answer = state
        .synthesizer
        .answer(&query, &context)
        .await
        .map_err(|e| {
            warn!(error = %e, "synthesis failed");
            AppError::provider(format!("{:#}", e))
        })?;

    Ok(Json(AskResponse { answer }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EchoSynthesizer, KeywordEmbedder};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use merchant_insights_core::chunk::chunk_row;
    use merchant_insights_core::models::Chunk;
    use tower::ServiceExt;

    const KEYWORDS: &[&str] = &["refunded", "failed", "settled"];

    fn chunks() -> Vec<Chunk> {
        let columns = vec!["amount".to_string(), "status".to_string()];
        [("100", "refunded"), ("40", "failed"), ("75", "settled")]
            .iter()
            .enumerate()
            .map(|(row, (amount, status))| {
                let cells = [amount.to_string(), status.to_string()];
                Chunk {
                    source: "txns.csv".into(),
                    row,
                    text: chunk_row("txns.csv", &columns, &cells),
                }
            })
            .collect()
    }

    async fn state_with(
        embedder: KeywordEmbedder,
        synthesizer: EchoSynthesizer,
        build: bool,
    ) -> AppState<KeywordEmbedder> {
        let pipeline = Pipeline::new(embedder);
        if build {
            pipeline.build(chunks(), 1).await.unwrap();
        }
        AppState {
            pipeline: Arc::new(pipeline),
            synthesizer: Arc::new(synthesizer),
            top_k: 2,
            ready_since: Utc::now(),
        }
    }

    async fn ready_state() -> AppState<KeywordEmbedder> {
        state_with(KeywordEmbedder::new(KEYWORDS), EchoSynthesizer::default(), true).await
    }

    fn ask_request(body: &str) -> Request<Body> {
        Request::post("/ask")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_banner() {
        let response = router(ready_state().await)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], BANNER.as_bytes());
    }

    #[tokio::test]
    async fn test_health_reports_chunks() {
        let response = router(ready_state().await)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["chunks"], 3);
        assert_eq!(body["dims"], KEYWORDS.len());
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_ask_answers_from_nearest_chunk() {
        let response = router(ready_state().await)
            .oneshot(ask_request(r#"{"query": "Which payments failed?"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["answer"], "txns.csv | amount: 40 | status: failed");
    }

    #[tokio::test]
    async fn test_ask_uses_request_k() {
        let synthesizer = Arc::new(EchoSynthesizer::default());
        let pipeline = Pipeline::new(KeywordEmbedder::new(KEYWORDS));
        pipeline.build(chunks(), 1).await.unwrap();
        let state = AppState {
            pipeline: Arc::new(pipeline),
            synthesizer: synthesizer.clone(),
            top_k: 2,
            ready_since: Utc::now(),
        };

        let response = router(state)
            .oneshot(ask_request(r#"{"query": "settled", "k": 3}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let seen = synthesizer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "settled");
        assert_eq!(seen[0].1.len(), 3);
        assert_eq!(seen[0].1[0], "txns.csv | amount: 75 | status: settled");
    }

    #[tokio::test]
    async fn test_empty_query_is_bad_request() {
        let state = ready_state().await;
        let pipeline = state.pipeline.clone();
        let response = router(state)
            .oneshot(ask_request(r#"{"query": "   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "bad_request");
        assert_eq!(body["error"]["retryable"], false);
        // three build calls, none for the rejected query
        assert_eq!(pipeline.embedder().calls(), 3);
    }

    #[tokio::test]
    async fn test_missing_query_is_bad_request() {
        let response = router(ready_state().await)
            .oneshot(ask_request(r#"{"k": 2}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let response = router(ready_state().await)
            .oneshot(ask_request("{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_zero_k_is_bad_request() {
        let response = router(ready_state().await)
            .oneshot(ask_request(r#"{"query": "refunded", "k": 0}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unbuilt_pipeline_is_not_ready() {
        let embedder = KeywordEmbedder::new(KEYWORDS);
        let state = state_with(embedder, EchoSynthesizer::default(), false).await;
        let response = router(state)
            .oneshot(ask_request(r#"{"query": "refunded"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "not_ready");
        assert_eq!(body["error"]["retryable"], true);
    }

    #[tokio::test]
    async fn test_synthesis_failure_is_provider_error() {
        let synthesizer = EchoSynthesizer {
            fail: true,
            ..Default::default()
        };
        let state = state_with(KeywordEmbedder::new(KEYWORDS), synthesizer, true).await;
        let response = router(state)
            .oneshot(ask_request(r#"{"query": "refunded"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "provider_error");
    }

    #[test]
    fn test_error_classification() {
        let cases = [
            (
                RetrievalError::Embedding(EmbeddingError::RateLimited("slow".into())),
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                true,
            ),
            (
                RetrievalError::Embedding(EmbeddingError::Timeout("30s".into())),
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                true,
            ),
            (
                RetrievalError::Embedding(EmbeddingError::Auth("bad key".into())),
                StatusCode::BAD_GATEWAY,
                "provider_error",
                false,
            ),
            (
                RetrievalError::Embedding(EmbeddingError::Network("refused".into())),
                StatusCode::BAD_GATEWAY,
                "provider_error",
                true,
            ),
            (
                RetrievalError::IndexNotReady,
                StatusCode::SERVICE_UNAVAILABLE,
                "not_ready",
                true,
            ),
            (
                RetrievalError::AlreadyBuilt,
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                false,
            ),
        ];
        for (err, status, code, retryable) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status, status);
            assert_eq!(app.code, code);
            assert_eq!(app.retryable, retryable, "{}", code);
        }
    }
}
