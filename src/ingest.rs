//! Ingestion pipeline: document → chunks → embeddings → store.
//!
//! Each source is handled independently. A failure (empty text, embedding
//! error, store error) is recorded as an [`IngestionError`] and the batch
//! moves on to the next source.

use std::sync::Arc;

use ragbot_core::chunk::{chunk_document, ChunkPolicy};
use ragbot_core::embedding::Embedder;
use ragbot_core::error::IngestionError;
use ragbot_core::models::{Document, EmbeddedChunk};
use ragbot_core::store::VectorStore;
use tracing::{info, warn};

use crate::progress::{IngestEvent, NoProgress, ProgressReporter};

/// Totals for one ingestion batch.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub failures: Vec<IngestionError>,
}

#[derive(Clone)]
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    policy: ChunkPolicy,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, policy: ChunkPolicy) -> Self {
        Self {
            embedder,
            store,
            policy,
        }
    }

    /// Chunk, embed and store one document, replacing whatever was stored
    /// for its source before. Returns the number of chunks written.
    pub async fn ingest(&self, doc: &Document) -> Result<usize, IngestionError> {
        let fail = |reason: String| IngestionError::new(&doc.source_id, reason);

        let chunks = chunk_document(doc, &self.policy);
        if chunks.is_empty() {
            return Err(fail("document has no text to index".to_string()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| fail(format!("embedding failed: {:#}", e)))?;
        if vectors.len() != chunks.len() {
            return Err(fail(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
            .collect();

        self.store
            .replace_source(doc, &embedded, self.embedder.model_name())
            .await
            .map_err(|e| fail(format!("store write failed: {:#}", e)))?;

        info!(source = %doc.source_id, chunks = embedded.len(), "ingested");
        Ok(embedded.len())
    }

    /// Ingest every item, collecting upstream load errors and per-document
    /// failures into the report.
    pub async fn ingest_all<I>(&self, items: I) -> IngestReport
    where
        I: IntoIterator<Item = Result<Document, IngestionError>>,
    {
        self.ingest_all_with_progress(items, &NoProgress).await
    }

    pub async fn ingest_all_with_progress<I>(
        &self,
        items: I,
        progress: &dyn ProgressReporter,
    ) -> IngestReport
    where
        I: IntoIterator<Item = Result<Document, IngestionError>>,
    {
        let mut report = IngestReport::default();
        for item in items {
            self.ingest_item(item, &mut report, progress).await;
        }
        report
    }

    /// Ingest one loader item into a running report. Load errors and
    /// ingestion failures are recorded; nothing is returned early.
    pub async fn ingest_item(
        &self,
        item: Result<Document, IngestionError>,
        report: &mut IngestReport,
        progress: &dyn ProgressReporter,
    ) {
        let outcome = match item {
            Ok(doc) => self.ingest(&doc).await.map(|n| (doc.source_id, n)),
            Err(e) => Err(e),
        };
        match outcome {
            Ok((source_id, chunks)) => {
                report.documents += 1;
                report.chunks += chunks;
                progress.report(IngestEvent::Stored {
                    source_id,
                    chunks,
                    n: report.documents as u64,
                });
            }
            Err(e) => {
                warn!(source = %e.source_id, reason = %e.reason, "ingestion failed");
                progress.report(IngestEvent::Failed {
                    source_id: e.source_id.clone(),
                    reason: e.reason.clone(),
                });
                report.failures.push(e);
            }
        }
    }
}
