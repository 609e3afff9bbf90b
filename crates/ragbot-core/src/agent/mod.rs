//! The per-turn agent: a small explicit state machine that optionally
//! retrieves context, calls the model, runs at most one round of tool calls
//! and records the reply.
//!
//! ```text
//! Start ──(rag on)──▶ Retrieve ──▶ Generate ──(text)──▶ End
//!   │                                 ▲  │
//!   └──────────(rag off)──────────────┘  └─(tool request)─▶ ToolCall ─▶ Generate
//! ```
//!
//! The model, the retriever and the tool registry are injected; the graph
//! holds no global state.

pub mod graph;
pub mod tools;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::models::{ConversationTurn, ToolCall};

pub use graph::{AgentGraph, AgentSettings, Step, ToolCallRecord, TurnOutcome};
pub use tools::{Tool, ToolRegistry};

/// What the model answered with.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// A final natural-language reply.
    Text(String),
    /// A request to run tools before answering. `content` is whatever text
    /// the model produced alongside the calls, often empty.
    ToolRequest {
        content: String,
        calls: Vec<ToolCall>,
    },
}

/// A tool as advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object.
    pub parameters: Value,
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Complete the conversation in `messages`. When `tools` is empty the
    /// model is not offered any tools.
    async fn complete(&self, messages: &[ConversationTurn], tools: &[ToolSpec]) -> Result<ModelReply>;
}
