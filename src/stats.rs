//! Knowledge-base and conversation statistics.
//!
//! Backs `ragbot stats`, the CLI `stats` command, the setup summary panel
//! and the web UI's Analytics tab.

use std::collections::BTreeMap;
use std::path::Path;

use ragbot_core::models::{Role, Session, StoredDocument};
use ragbot_core::store::VectorStore;
use serde::Serialize;

/// Per-source row of [`KnowledgeStats`].
#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub source_id: String,
    pub title: String,
    pub format: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KnowledgeStats {
    pub documents: usize,
    pub chunks: usize,
    pub embedding_model: String,
    pub store_path: String,
    pub store_bytes: u64,
    /// Chunk counts keyed by format tag.
    pub chunks_by_format: BTreeMap<String, usize>,
    pub sources: Vec<SourceStats>,
}

impl KnowledgeStats {
    pub fn from_documents(docs: &[StoredDocument], chunks: usize) -> Self {
        let mut chunks_by_format = BTreeMap::new();
        for doc in docs {
            *chunks_by_format
                .entry(doc.format.as_str().to_string())
                .or_insert(0) += doc.chunk_count;
        }

        let mut sources: Vec<SourceStats> = docs
            .iter()
            .map(|d| SourceStats {
                source_id: d.source_id.clone(),
                title: d.title.clone(),
                format: d.format.as_str().to_string(),
                chunks: d.chunk_count,
            })
            .collect();
        sources.sort_by(|a, b| b.chunks.cmp(&a.chunks).then_with(|| a.source_id.cmp(&b.source_id)));

        Self {
            documents: docs.len(),
            chunks,
            chunks_by_format,
            sources,
            ..Self::default()
        }
    }

    /// Read counts from `store`. `store_path` is the on-disk file, if any.
    pub async fn collect(
        store: &dyn VectorStore,
        embedding_model: &str,
        store_path: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let docs = store.list_documents().await?;
        let chunks = store.chunk_count().await?;
        let mut stats = Self::from_documents(&docs, chunks);
        stats.embedding_model = embedding_model.to_string();
        match store_path {
            Some(path) => {
                stats.store_path = path.display().to_string();
                stats.store_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            }
            None => stats.store_path = "(in memory)".to_string(),
        }
        Ok(stats)
    }

    /// Plain-text summary for terminal output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("  Store:       {}\n", self.store_path));
        out.push_str(&format!("  Size:        {}\n", format_bytes(self.store_bytes)));
        out.push_str(&format!("  Embeddings:  {}\n", self.embedding_model));
        out.push_str(&format!("  Documents:   {}\n", self.documents));
        out.push_str(&format!("  Chunks:      {}\n", self.chunks));

        if !self.chunks_by_format.is_empty() {
            out.push_str("\n  By format:\n");
            for (format, chunks) in &self.chunks_by_format {
                out.push_str(&format!("    {:<10} {:>6}\n", format, chunks));
            }
        }

        if !self.sources.is_empty() {
            out.push_str(&format!("\n  {:<48} {:>8} {:>8}\n", "SOURCE", "FORMAT", "CHUNKS"));
            out.push_str(&format!("  {}\n", "-".repeat(66)));
            for s in &self.sources {
                out.push_str(&format!(
                    "  {:<48} {:>8} {:>8}\n",
                    truncate_left(&s.source_id, 48),
                    s.format,
                    s.chunks
                ));
            }
        }
        out
    }
}

/// Turn counts for one session.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationStats {
    pub session_id: String,
    pub started_at: String,
    pub rag_enabled: bool,
    pub user_turns: usize,
    pub assistant_turns: usize,
    pub tool_turns: usize,
    pub retrieved_last_turn: usize,
}

impl ConversationStats {
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            started_at: session.started_at.to_rfc3339(),
            rag_enabled: session.rag_enabled,
            user_turns: session.count_role(Role::User),
            assistant_turns: session.count_role(Role::Assistant),
            tool_turns: session.count_role(Role::Tool),
            retrieved_last_turn: session.context.len(),
        }
    }
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Keep the tail of long paths and URLs, which is the informative part.
fn truncate_left(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    let tail: String = s.chars().skip(count - (max - 3)).collect();
    format!("...{}", tail)
}
