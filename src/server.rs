//! Web UI server.
//!
//! Serves a single-page UI (tabs: Status, Documents, Scrape, Chat,
//! Analytics) and the JSON API behind it. One chat session lives in the
//! server; turns are serialised through a `tokio::sync::Mutex`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | The UI page |
//! | `GET`  | `/api/status` | Models, tracing and store counts |
//! | `GET`  | `/api/documents` | Stored documents |
//! | `POST` | `/api/documents/load` | Ingest the documents folder |
//! | `POST` | `/api/documents/clear` | Clear the knowledge base |
//! | `POST` | `/api/scrape` | `{ "url" }`: scrape and ingest one page |
//! | `POST` | `/api/chat` | `{ "message", "rag"? }`: run one turn |
//! | `POST` | `/api/chat/reset` | Start a new session |
//! | `GET`  | `/api/chat/history` | Turns of the current session |
//! | `GET`  | `/api/analytics` | Knowledge and conversation statistics |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ragbot_core::agent::TurnOutcome;
use ragbot_core::models::{ConversationTurn, Session, StoredDocument};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app::App;
use crate::knowledge::{FolderIngest, ScrapedPage};
use crate::scrape::normalize_url;
use crate::stats::{ConversationStats, KnowledgeStats};

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Clone)]
struct AppState {
    app: Arc<App>,
    session: Arc<Mutex<Session>>,
}

/// Build the router. Exposed separately from [`run_server`] so it can be
/// driven without a socket.
pub fn router(app: Arc<App>) -> Router {
    let session = app.new_session();
    let state = AppState {
        app,
        session: Arc::new(Mutex::new(session)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/api/status", get(handle_status))
        .route("/api/documents", get(handle_list_documents))
        .route("/api/documents/load", post(handle_load_documents))
        .route("/api/documents/clear", post(handle_clear_documents))
        .route("/api/scrape", post(handle_scrape))
        .route("/api/chat", post(handle_chat))
        .route("/api/chat/reset", post(handle_chat_reset))
        .route("/api/chat/history", get(handle_chat_history))
        .route("/api/analytics", get(handle_analytics))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(app: App) -> anyhow::Result<()> {
    let bind_addr = app.config.server.bind.clone();
    let router = router(Arc::new(app));

    println!("Web UI listening on http://{}", bind_addr);
    info!(%bind_addr, "web server started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        internal(format!("{:#}", err))
    }
}

// ============ Pages ============

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/status ============

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    model: String,
    embedding_model: String,
    tracing_enabled: bool,
    tracing_project: Option<String>,
    documents_folder: String,
    documents: usize,
    chunks: usize,
    rag_enabled: bool,
    tools: Vec<String>,
}

async fn handle_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    let app = &state.app;
    let rag_enabled = state.session.lock().await.rag_enabled;
    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: app.agent.model_name().to_string(),
        embedding_model: app.config.embedding.model_name(),
        tracing_enabled: app.tracer.is_enabled(),
        tracing_project: app.tracer.project().map(str::to_string),
        documents_folder: app.kb.documents_folder().display().to_string(),
        documents: app.kb.document_count().await?,
        chunks: app.kb.chunk_count().await?,
        rag_enabled,
        tools: app.agent.tools().names().iter().map(|n| n.to_string()).collect(),
    }))
}

// ============ Documents ============

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<StoredDocument>,
}

async fn handle_list_documents(State(state): State<AppState>) -> Result<Json<DocumentsResponse>, AppError> {
    let documents = state.app.kb.list_documents().await?;
    Ok(Json(DocumentsResponse { documents }))
}

async fn handle_load_documents(State(state): State<AppState>) -> Result<Json<FolderIngest>, AppError> {
    let report = state.app.kb.load_documents().await?;
    Ok(Json(report))
}

#[derive(Serialize)]
struct ClearResponse {
    cleared: bool,
}

async fn handle_clear_documents(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    state.app.kb.clear().await?;
    Ok(Json(ClearResponse { cleared: true }))
}

// ============ POST /api/scrape ============

#[derive(Deserialize)]
struct ScrapeRequest {
    url: String,
}

async fn handle_scrape(
    State(state): State<AppState>,
    Json(req): Json<ScrapeRequest>,
) -> Result<Json<ScrapedPage>, AppError> {
    normalize_url(&req.url).map_err(|e| bad_request(e.reason))?;
    let page = state
        .app
        .kb
        .scrape(&req.url)
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(page))
}

// ============ Chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    rag: Option<bool>,
}

#[derive(Serialize)]
struct ChatResponse {
    session_id: String,
    rag_enabled: bool,
    #[serde(flatten)]
    outcome: TurnOutcome,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let mut session = state.session.lock().await;
    if let Some(rag) = req.rag {
        session.rag_enabled = rag;
    }
    let outcome = state.app.chat(&mut session, message).await;
    Ok(Json(ChatResponse {
        session_id: session.id.clone(),
        rag_enabled: session.rag_enabled,
        outcome,
    }))
}

#[derive(Serialize)]
struct ResetResponse {
    session_id: String,
}

async fn handle_chat_reset(State(state): State<AppState>) -> Json<ResetResponse> {
    let mut session = state.session.lock().await;
    let mut fresh = state.app.new_session();
    fresh.rag_enabled = session.rag_enabled;
    *session = fresh;
    Json(ResetResponse {
        session_id: session.id.clone(),
    })
}

#[derive(Serialize)]
struct HistoryResponse {
    session_id: String,
    turns: Vec<ConversationTurn>,
}

async fn handle_chat_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let session = state.session.lock().await;
    Json(HistoryResponse {
        session_id: session.id.clone(),
        turns: session.turns.clone(),
    })
}

// ============ GET /api/analytics ============

#[derive(Serialize)]
struct AnalyticsResponse {
    knowledge: KnowledgeStats,
    conversation: ConversationStats,
}

async fn handle_analytics(State(state): State<AppState>) -> Result<Json<AnalyticsResponse>, AppError> {
    let knowledge = state.app.kb.stats().await?;
    let conversation = ConversationStats::from_session(&*state.session.lock().await);
    Ok(Json(AnalyticsResponse {
        knowledge,
        conversation,
    }))
}
