//! In-memory [`VectorStore`] for tests and throwaway sessions.
//!
//! Sources are kept in insertion order behind a `std::sync::RwLock`;
//! nearest-neighbour search is brute-force cosine distance.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Document, EmbeddedChunk, ScoredChunk, StoredDocument};

use super::{rank_by_distance, VectorStore};

struct StoredSource {
    doc: Document,
    chunks: Vec<EmbeddedChunk>,
}

#[derive(Default)]
pub struct InMemoryStore {
    sources: RwLock<Vec<StoredSource>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<StoredSource>>> {
        self.sources
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<StoredSource>>> {
        self.sources
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn replace_source(
        &self,
        doc: &Document,
        chunks: &[EmbeddedChunk],
        _model: &str,
    ) -> Result<()> {
        let mut sources = self.write()?;
        sources.retain(|s| s.doc.source_id != doc.source_id);
        sources.push(StoredSource {
            doc: doc.clone(),
            chunks: chunks.to_vec(),
        });
        Ok(())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let sources = self.read()?;
        let candidates = sources.iter().flat_map(|s| {
            s.chunks.iter().map(move |c| {
                (
                    ScoredChunk {
                        source_id: s.doc.source_id.clone(),
                        title: s.doc.title.clone(),
                        offset: c.chunk.offset,
                        text: c.chunk.text.clone(),
                        distance: 0.0,
                    },
                    c.vector.clone(),
                )
            })
        });
        Ok(rank_by_distance(query, candidates, k))
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(self.read()?.iter().map(|s| s.chunks.len()).sum())
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        Ok(self
            .read()?
            .iter()
            .map(|s| StoredDocument {
                source_id: s.doc.source_id.clone(),
                title: s.doc.title.clone(),
                format: s.doc.format,
                chunk_count: s.chunks.len(),
                ingested_at: s.doc.ingested_at,
            })
            .collect())
    }

    async fn remove_source(&self, source_id: &str) -> Result<bool> {
        let mut sources = self.write()?;
        let before = sources.len();
        sources.retain(|s| s.doc.source_id != source_id);
        Ok(sources.len() != before)
    }

    async fn clear(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_document, ChunkPolicy};
    use crate::models::DocumentFormat;

    fn embedded(doc: &Document, vectors: &[Vec<f32>]) -> Vec<EmbeddedChunk> {
        let chunks = chunk_document(doc, &ChunkPolicy::new(10, 0));
        chunks
            .into_iter()
            .zip(vectors.iter().cycle())
            .map(|(chunk, v)| EmbeddedChunk {
                chunk,
                vector: v.clone(),
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let store = InMemoryStore::new();
        assert!(store.nearest(&[1.0, 0.0], 3).await.unwrap().is_empty());
        assert_eq!(store.chunk_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reingest_replaces_chunks() {
        let store = InMemoryStore::new();
        let doc = Document::new("a.txt", "a", DocumentFormat::Text, "aaaaaaaaa bbbbbbbbb ccccccccc");
        let chunks = embedded(&doc, &[vec![1.0, 0.0]]);
        store.replace_source(&doc, &chunks, "test").await.unwrap();
        let first = store.chunk_count().await.unwrap();
        store.replace_source(&doc, &chunks, "test").await.unwrap();

        assert_eq!(store.chunk_count().await.unwrap(), first);
        assert_eq!(store.document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn nearest_orders_by_distance() {
        let store = InMemoryStore::new();
        let vectors = [
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![-1.0, 0.0],
            vec![1.0, 0.2],
        ];
        for (i, v) in vectors.iter().enumerate() {
            let doc = Document::new(format!("doc{i}"), "t", DocumentFormat::Text, "short");
            store
                .replace_source(&doc, &embedded(&doc, &[v.clone()]), "test")
                .await
                .unwrap();
        }

        let hits = store.nearest(&[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.source_id.as_str()).collect();
        assert_eq!(ids, vec!["doc1", "doc4", "doc2"]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let store = InMemoryStore::new();
        let doc = Document::new("a.txt", "a", DocumentFormat::Text, "hello");
        store
            .replace_source(&doc, &embedded(&doc, &[vec![1.0]]), "test")
            .await
            .unwrap();
        assert!(store.remove_source("a.txt").await.unwrap());
        assert!(!store.remove_source("a.txt").await.unwrap());

        store
            .replace_source(&doc, &embedded(&doc, &[vec![1.0]]), "test")
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.document_count().await.unwrap(), 0);
    }
}
