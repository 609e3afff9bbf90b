//! Query-time retrieval: embed the query, ask the store for its nearest
//! chunks.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::Embedder;
use crate::error::RetrievalError;
use crate::models::ScoredChunk;
use crate::store::VectorStore;

/// Default number of chunks handed to the model per turn.
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Return the `k` chunks nearest to `query`, closest first.
    ///
    /// An empty store, `k == 0` or a blank query give an empty result
    /// without touching the embedder.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let stored = self.store.chunk_count().await?;
        if stored == 0 {
            debug!("retrieval skipped: store is empty");
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed_query(query).await?;
        let hits = self.store.nearest(&vector, k).await?;
        debug!(hits = hits.len(), stored, k, "retrieved chunks");
        Ok(hits)
    }

    /// Number of chunks currently searchable.
    pub async fn chunk_count(&self) -> Result<usize, RetrievalError> {
        Ok(self.store.chunk_count().await?)
    }
}
