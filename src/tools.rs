//! Tools that operate on the knowledge base.
//!
//! Registered next to the clock/echo built-ins from `ragbot-core`:
//!
//! | Tool | Parameters | Effect |
//! |------|------------|--------|
//! | `load_documents` | none | ingest the documents folder |
//! | `scrape_website` | `url` | scrape one page and ingest it |
//! | `search_knowledge_base` | `query` | top 3 chunks, 300 chars each |
//! | `get_knowledge_base_stats` | none | chunk and document counts |
//! | `clear_knowledge_base` | none | drop everything |

use anyhow::{bail, Result};
use async_trait::async_trait;
use ragbot_core::agent::graph::truncate_chars;
use ragbot_core::agent::{Tool, ToolRegistry};
use serde_json::{json, Value};

use crate::knowledge::KnowledgeBase;

/// Chunks returned by `search_knowledge_base`.
pub const SEARCH_TOOL_K: usize = 3;
/// Characters of each chunk shown by `search_knowledge_base`.
pub const SEARCH_TOOL_CHARS: usize = 300;

/// Built-ins plus every knowledge-base tool.
pub fn default_registry(kb: &KnowledgeBase) -> ToolRegistry {
    let mut registry = ToolRegistry::with_builtins();
    registry.register(Box::new(LoadDocumentsTool { kb: kb.clone() }));
    registry.register(Box::new(ScrapeWebsiteTool { kb: kb.clone() }));
    registry.register(Box::new(SearchKnowledgeBaseTool { kb: kb.clone() }));
    registry.register(Box::new(KnowledgeBaseStatsTool { kb: kb.clone() }));
    registry.register(Box::new(ClearKnowledgeBaseTool { kb: kb.clone() }));
    registry
}

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    match params.get(key).and_then(|v| v.as_str()).map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => bail!("Please provide a '{}' parameter.", key),
    }
}

pub struct LoadDocumentsTool {
    kb: KnowledgeBase,
}

#[async_trait]
impl Tool for LoadDocumentsTool {
    fn name(&self) -> &str {
        "load_documents"
    }

    fn description(&self) -> &str {
        "Load all documents from the documents folder and store them in the knowledge base for retrieval."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value) -> Result<String> {
        let report = self.kb.load_documents().await?;
        if report.documents == 0 && report.failures.is_empty() {
            return Ok(format!(
                "No documents found in the {} folder. Please add some documents first.",
                report.folder
            ));
        }

        let total = self.kb.chunk_count().await?;
        let mut out = format!(
            "Successfully loaded and processed {} documents. The knowledge base now contains {} chunks.",
            report.documents, total
        );
        if !report.failures.is_empty() {
            out.push_str(&format!("\n{} files could not be loaded:", report.failures.len()));
            for f in &report.failures {
                out.push_str(&format!("\n- {}: {}", f.source, f.reason));
            }
        }
        Ok(out)
    }
}

pub struct ScrapeWebsiteTool {
    kb: KnowledgeBase,
}

#[async_trait]
impl Tool for ScrapeWebsiteTool {
    fn name(&self) -> &str {
        "scrape_website"
    }

    fn description(&self) -> &str {
        "Scrape content from a website URL and add it to the knowledge base."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Page to scrape" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let url = required_str(&params, "url")?;
        let page = self.kb.scrape(url).await?;
        let total = self.kb.chunk_count().await?;
        Ok(format!(
            "Successfully scraped and stored website content from {} (\"{}\"). The knowledge base now contains {} chunks.",
            page.url, page.title, total
        ))
    }
}

pub struct SearchKnowledgeBaseTool {
    kb: KnowledgeBase,
}

#[async_trait]
impl Tool for SearchKnowledgeBaseTool {
    fn name(&self) -> &str {
        "search_knowledge_base"
    }

    fn description(&self) -> &str {
        "Search the knowledge base for relevant information based on a query."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to look for" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let query = required_str(&params, "query")?;
        let hits = self.kb.search(query, SEARCH_TOOL_K).await?;
        if hits.is_empty() {
            return Ok(format!("No relevant documents found for query: '{}'", query));
        }

        let mut out = format!(
            "Found {} relevant documents for query: '{}'\n\n",
            hits.len(),
            query
        );
        for (i, hit) in hits.iter().enumerate() {
            out.push_str(&format!(
                "Document {} (Source: {}):\n{}\n\n",
                i + 1,
                hit.source_id,
                truncate_chars(&hit.text, SEARCH_TOOL_CHARS)
            ));
        }
        Ok(out.trim_end().to_string())
    }
}

pub struct KnowledgeBaseStatsTool {
    kb: KnowledgeBase,
}

#[async_trait]
impl Tool for KnowledgeBaseStatsTool {
    fn name(&self) -> &str {
        "get_knowledge_base_stats"
    }

    fn description(&self) -> &str {
        "Get statistics about the knowledge base including document and chunk counts."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value) -> Result<String> {
        let chunks = self.kb.chunk_count().await?;
        let documents = self.kb.document_count().await?;
        Ok(format!(
            "Knowledge base contains {} document chunks from {} sources.",
            chunks, documents
        ))
    }
}

pub struct ClearKnowledgeBaseTool {
    kb: KnowledgeBase,
}

#[async_trait]
impl Tool for ClearKnowledgeBaseTool {
    fn name(&self) -> &str {
        "clear_knowledge_base"
    }

    fn description(&self) -> &str {
        "Clear all documents from the knowledge base."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value) -> Result<String> {
        self.kb.clear().await?;
        Ok("Knowledge base has been cleared.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use ragbot_core::embedding::Embedder;
    use ragbot_core::models::{Chunk, Document, DocumentFormat, EmbeddedChunk, ToolCall};
    use ragbot_core::store::memory::InMemoryStore;
    use ragbot_core::store::VectorStore;

    struct FlatEmbedder;

    #[async_trait]
    impl Embedder for FlatEmbedder {
        fn model_name(&self) -> &str {
            "flat"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    async fn seeded() -> (KnowledgeBase, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let doc = Document::new("notes.txt", "notes", DocumentFormat::Text, "x");
        let long = "y".repeat(400);
        store
            .replace_source(
                &doc,
                &[EmbeddedChunk {
                    chunk: Chunk {
                        source_id: "notes.txt".into(),
                        offset: 0,
                        index: 0,
                        text: long,
                        hash: String::new(),
                    },
                    vector: vec![1.0],
                }],
                "flat",
            )
            .await
            .unwrap();
        let kb = KnowledgeBase::new(&Config::default(), Arc::new(FlatEmbedder), store.clone()).unwrap();
        (kb, store)
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "c".into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[tokio::test]
    async fn registry_has_all_tools() {
        let (kb, _) = seeded().await;
        let registry = default_registry(&kb);
        assert_eq!(
            registry.names(),
            vec![
                "get_time",
                "echo",
                "load_documents",
                "scrape_website",
                "search_knowledge_base",
                "get_knowledge_base_stats",
                "clear_knowledge_base"
            ]
        );
    }

    #[tokio::test]
    async fn search_truncates_results() {
        let (kb, _) = seeded().await;
        let registry = default_registry(&kb);
        let out = registry
            .invoke(&call("search_knowledge_base", r#"{"query":"y"}"#))
            .await
            .unwrap();
        assert!(out.starts_with("Found 1 relevant documents for query: 'y'"));
        assert!(out.contains("Document 1 (Source: notes.txt):"));
        assert!(!out.contains(&"y".repeat(301)));
    }

    #[tokio::test]
    async fn missing_parameter_is_a_tool_error() {
        let (kb, _) = seeded().await;
        let registry = default_registry(&kb);
        let err = registry
            .invoke(&call("scrape_website", "{}"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'url'"));
    }

    #[tokio::test]
    async fn stats_then_clear() {
        let (kb, store) = seeded().await;
        let registry = default_registry(&kb);
        let stats = registry
            .invoke(&call("get_knowledge_base_stats", ""))
            .await
            .unwrap();
        assert_eq!(stats, "Knowledge base contains 1 document chunks from 1 sources.");

        let cleared = registry
            .invoke(&call("clear_knowledge_base", "{}"))
            .await
            .unwrap();
        assert_eq!(cleared, "Knowledge base has been cleared.");
        assert_eq!(store.chunk_count().await.unwrap(), 0);
    }
}
