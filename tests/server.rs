//! Integration tests for the web UI's JSON API.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`,
//! using a scripted chat model, a deterministic embedder and the
//! in-memory store.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use ragbot::app::App;
use ragbot::config::Config;
use ragbot::server::router;
use ragbot::trace::Tracer;
use ragbot_core::agent::{ChatModel, ModelReply, ToolSpec};
use ragbot_core::embedding::Embedder;
use ragbot_core::models::{ConversationTurn, Role, ToolCall};
use ragbot_core::store::memory::InMemoryStore;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letters"
    }

    fn dims(&self) -> usize {
        26
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 26];
                for c in t.chars().filter(char::is_ascii_alphabetic) {
                    v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Answers with the number of system turns it saw. Asks for the stats tool
/// when the user says "stats", then repeats the tool's output.
#[derive(Default)]
struct ScriptedModel {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ConversationTurn], _tools: &[ToolSpec]) -> anyhow::Result<ModelReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let last = messages.last().ok_or_else(|| anyhow::anyhow!("no messages"))?;
        if last.role == Role::Tool {
            return Ok(ModelReply::Text(format!("Tool says: {}", last.content)));
        }
        if last.content.contains("stats") {
            return Ok(ModelReply::ToolRequest {
                content: String::new(),
                calls: vec![ToolCall {
                    id: "call_1".into(),
                    name: "get_knowledge_base_stats".into(),
                    arguments: "{}".into(),
                }],
            });
        }
        let system = messages.iter().filter(|m| m.role == Role::System).count();
        Ok(ModelReply::Text(format!("reply with {} system turns", system)))
    }
}

struct Harness {
    _tmp: TempDir,
    router: Router,
    model: Arc<ScriptedModel>,
}

fn harness() -> Harness {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("rawdata");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("harbor.md"), "The harbor opens at dawn for fishing boats.").unwrap();
    fs::write(docs.join("menu.txt"), "Soup of the day is lentil.").unwrap();

    let mut config = Config::default();
    config.documents.folder = docs;

    let model = Arc::new(ScriptedModel::default());
    let app = App::with_parts(
        config,
        Arc::new(LetterEmbedder),
        Arc::new(InMemoryStore::new()),
        model.clone(),
        Tracer::disabled(),
    )
    .unwrap();

    Harness {
        _tmp: tmp,
        router: router(Arc::new(app)),
        model,
    }
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn index_page_is_served() {
    let h = harness();
    let response = h
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    for tab in ["Status", "Documents", "Scrape", "Chat", "Analytics"] {
        assert!(html.contains(tab), "missing tab {}", tab);
    }
}

#[tokio::test]
async fn health_and_status() {
    let h = harness();
    let (status, body) = call(&h.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = call(&h.router, Method::GET, "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "scripted");
    assert_eq!(body["embedding_model"], "text-embedding-3-small");
    assert_eq!(body["tracing_enabled"], false);
    assert_eq!(body["chunks"], 0);
    assert_eq!(body["rag_enabled"], true);
    assert!(body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t == "search_knowledge_base"));
}

#[tokio::test]
async fn load_list_and_clear_documents() {
    let h = harness();
    let (status, report) = call(&h.router, Method::POST, "/api/documents/load", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["documents"], 2);
    assert!(report["failures"].as_array().unwrap().is_empty());

    let (_, listed) = call(&h.router, Method::GET, "/api/documents", None).await;
    let docs = listed["documents"].as_array().unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().any(|d| d["format"] == "markdown"));

    let (_, analytics) = call(&h.router, Method::GET, "/api/analytics", None).await;
    assert_eq!(analytics["knowledge"]["documents"], 2);
    assert_eq!(analytics["knowledge"]["chunks_by_format"]["text"], 1);

    let (status, _) = call(&h.router, Method::POST, "/api/documents/clear", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, status_body) = call(&h.router, Method::GET, "/api/status", None).await;
    assert_eq!(status_body["documents"], 0);
}

#[tokio::test]
async fn chat_retrieves_context_when_enabled() {
    let h = harness();
    call(&h.router, Method::POST, "/api/documents/load", None).await;

    let (status, body) = call(
        &h.router,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "when does the harbor open?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rag_enabled"], true);
    assert_eq!(body["steps"], json!(["start", "retrieve", "generate", "end"]));
    assert!(!body["retrieved"].as_array().unwrap().is_empty());
    assert!(body["error"].is_null());

    let (_, body) = call(
        &h.router,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "no context please", "rag": false })),
    )
    .await;
    assert_eq!(body["rag_enabled"], false);
    assert_eq!(body["steps"], json!(["start", "generate", "end"]));
    assert!(body["retrieved"].as_array().unwrap().is_empty());

    let (_, history) = call(&h.router, Method::GET, "/api/chat/history", None).await;
    let roles: Vec<&str> = history["turns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["user", "assistant", "user", "assistant"]);
}

#[tokio::test]
async fn chat_runs_tools() {
    let h = harness();
    let (_, body) = call(
        &h.router,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "show me the stats", "rag": false })),
    )
    .await;
    assert_eq!(body["steps"], json!(["start", "generate", "tool_call", "generate", "end"]));
    assert_eq!(body["tool_calls"][0]["name"], "get_knowledge_base_stats");
    assert_eq!(body["tool_calls"][0]["ok"], true);
    assert_eq!(
        body["reply"],
        "Tool says: Knowledge base contains 0 document chunks from 0 sources."
    );
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_message_is_rejected_without_calling_the_model() {
    let h = harness();
    let (status, body) = call(&h.router, Method::POST, "/api/chat", Some(json!({ "message": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reset_starts_a_new_session_and_keeps_the_rag_flag() {
    let h = harness();
    let (_, first) = call(
        &h.router,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "hello", "rag": false })),
    )
    .await;

    let (_, reset) = call(&h.router, Method::POST, "/api/chat/reset", None).await;
    assert_ne!(reset["session_id"], first["session_id"]);

    let (_, history) = call(&h.router, Method::GET, "/api/chat/history", None).await;
    assert!(history["turns"].as_array().unwrap().is_empty());
    let (_, status) = call(&h.router, Method::GET, "/api/status", None).await;
    assert_eq!(status["rag_enabled"], false);
}

#[tokio::test]
async fn bad_scrape_url_is_a_bad_request() {
    let h = harness();
    let (status, body) = call(
        &h.router,
        Method::POST,
        "/api/scrape",
        Some(json!({ "url": "ftp://example.com/file" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}
