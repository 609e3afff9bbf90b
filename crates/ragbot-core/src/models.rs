//! Core data types: documents and chunks on the ingestion side, turns and
//! sessions on the conversation side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Format tag of a document, decided by file extension or by origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Text,
    Markdown,
    Csv,
    Html,
    Pdf,
    Docx,
    Pptx,
    Web,
}

impl DocumentFormat {
    /// Dispatch on a file extension (without the dot, any case).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "csv" => Some(Self::Csv),
            "html" | "htm" => Some(Self::Html),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Csv => "csv",
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Web => "web",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "web" => Some(Self::Web),
            other => Self::from_extension(other).or(match other {
                "text" => Some(Self::Text),
                _ => None,
            }),
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized text extracted from one file or web page.
///
/// Never mutated after creation; re-ingesting the same `source_id`
/// produces a new `Document` that supersedes this one in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// File path (as given to the loader) or URL.
    pub source_id: String,
    pub title: String,
    pub format: DocumentFormat,
    pub text: String,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        source_id: impl Into<String>,
        title: impl Into<String>,
        format: DocumentFormat,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            format,
            text: text.into(),
            ingested_at: Utc::now(),
        }
    }
}

/// A window of a document's text. Keyed by `(source_id, offset)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub source_id: String,
    /// Character offset of the window in the document text.
    pub offset: usize,
    /// Position of the window within its document, starting at 0.
    pub index: usize,
    pub text: String,
    /// SHA-256 of `text`, stored next to the embedding.
    pub hash: String,
}

/// A chunk paired with the vector computed from its text.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A chunk returned by the retriever, with its distance to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub source_id: String,
    pub title: String,
    pub offset: usize,
    pub text: String,
    /// `1 - cosine similarity`; smaller is closer.
    pub distance: f32,
}

/// Summary row for a stored document.
#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub source_id: String,
    pub title: String,
    pub format: DocumentFormat,
    pub chunk_count: usize,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Arguments as the JSON text the model produced.
    pub arguments: String,
}

/// Tool-related payload attached to a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolPayload {
    /// Assistant turn asking for one or more tool calls.
    Requested { calls: Vec<ToolCall> },
    /// Tool turn carrying the result of one call.
    Result { call_id: String, name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolPayload>,
    pub at: DateTime<Utc>,
}

impl ConversationTurn {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool: None,
            at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn tool_request(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool: Some(ToolPayload::Requested { calls }),
            ..Self::with_role(Role::Assistant, content)
        }
    }

    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool: Some(ToolPayload::Result {
                call_id: call.id.clone(),
                name: call.name.clone(),
            }),
            ..Self::with_role(Role::Tool, content)
        }
    }
}

/// One active chat: its turn log and the chunks retrieved for the latest
/// input. Lives only as long as the front end keeps it.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub rag_enabled: bool,
    pub turns: Vec<ConversationTurn>,
    pub context: Vec<ScoredChunk>,
}

impl Session {
    pub fn new(rag_enabled: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            rag_enabled,
            turns: Vec::new(),
            context: Vec::new(),
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// The most recent assistant turn that is not a bare tool request.
    pub fn last_reply(&self) -> Option<&ConversationTurn> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant && t.tool.is_none())
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }
}
