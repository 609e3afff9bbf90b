//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the only way the ingestion pipeline and the
//! retriever touch persisted chunks, so the on-disk SQLite store and the
//! in-memory store are interchangeable.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`replace_source`](VectorStore::replace_source) | Store a document and swap in its new chunk set |
//! | [`nearest`](VectorStore::nearest) | The `k` chunks closest to a query vector |
//! | [`chunk_count`](VectorStore::chunk_count) / [`document_count`](VectorStore::document_count) | Sizes |
//! | [`list_documents`](VectorStore::list_documents) | Per-document summary rows |
//! | [`remove_source`](VectorStore::remove_source) | Drop one source and its chunks |
//! | [`clear`](VectorStore::clear) | Drop everything |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::{Document, EmbeddedChunk, ScoredChunk, StoredDocument};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert `doc` and replace every chunk previously stored for
    /// `doc.source_id` with `chunks`. After this returns, no chunk of the
    /// earlier version of the source is visible to [`nearest`](Self::nearest).
    async fn replace_source(
        &self,
        doc: &Document,
        chunks: &[EmbeddedChunk],
        model: &str,
    ) -> Result<()>;

    /// Return up to `k` chunks ordered by non-decreasing cosine distance.
    /// Ties keep storage order.
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    async fn chunk_count(&self) -> Result<usize>;

    async fn document_count(&self) -> Result<usize>;

    async fn list_documents(&self) -> Result<Vec<StoredDocument>>;

    /// Returns `true` when the source existed.
    async fn remove_source(&self, source_id: &str) -> Result<bool>;

    async fn clear(&self) -> Result<()>;
}

/// Rank `(chunk, vector)` candidates by distance to `query`, keeping the
/// `k` closest. The sort is stable, so equal distances keep input order.
/// A vector that yields no distance (NaN) ranks after every real match.
pub fn rank_by_distance<I>(query: &[f32], candidates: I, k: usize) -> Vec<ScoredChunk>
where
    I: IntoIterator<Item = (ScoredChunk, Vec<f32>)>,
{
    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .map(|(mut chunk, vector)| {
            let distance = cosine_distance(query, &vector);
            chunk.distance = if distance.is_nan() { f32::MAX } else { distance };
            chunk
        })
        .collect();

    scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    scored.truncate(k);
    scored
}
