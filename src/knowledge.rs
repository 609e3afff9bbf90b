//! The knowledge base as the front ends and tools see it: one handle over
//! the loader, scraper, ingestor, retriever and store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use ragbot_core::embedding::Embedder;
use ragbot_core::error::{IngestionError, RetrievalError};
use ragbot_core::models::{ScoredChunk, StoredDocument};
use ragbot_core::retrieve::Retriever;
use ragbot_core::store::VectorStore;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{Config, DocumentsConfig};
use crate::ingest::{IngestReport, Ingestor};
use crate::loader::FolderLoader;
use crate::progress::{NoProgress, ProgressReporter};
use crate::scrape::Scraper;
use crate::stats::KnowledgeStats;

/// Loaded documents waiting for the ingestor.
const LOAD_QUEUE_DEPTH: usize = 4;

/// Result of loading the documents folder.
#[derive(Debug, Default, Serialize)]
pub struct FolderIngest {
    pub folder: String,
    pub documents: usize,
    pub chunks: usize,
    pub skipped: usize,
    pub failures: Vec<FailureView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureView {
    pub source: String,
    pub reason: String,
}

impl From<&IngestionError> for FailureView {
    fn from(e: &IngestionError) -> Self {
        Self {
            source: e.source_id.clone(),
            reason: e.reason.clone(),
        }
    }
}

/// A scraped page that made it into the store.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapedPage {
    pub url: String,
    pub title: String,
    pub chars: usize,
    pub chunks: usize,
}

#[derive(Clone)]
pub struct KnowledgeBase {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    ingestor: Ingestor,
    retriever: Retriever,
    scraper: Arc<Scraper>,
    documents: DocumentsConfig,
    store_path: Option<PathBuf>,
}

impl KnowledgeBase {
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Result<Self> {
        let scraper = Scraper::new(&config.scrape).context("failed to build HTTP client")?;
        Ok(Self {
            ingestor: Ingestor::new(embedder.clone(), store.clone(), config.chunking.policy()),
            retriever: Retriever::new(embedder.clone(), store.clone()),
            store,
            embedder,
            scraper: Arc::new(scraper),
            documents: config.documents.clone(),
            store_path: None,
        })
    }

    /// Record where the store lives on disk, for size reporting.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn retriever(&self) -> Retriever {
        self.retriever.clone()
    }

    pub fn documents_folder(&self) -> &Path {
        &self.documents.folder
    }

    /// Whether the documents folder holds anything the loader would try.
    pub fn folder_has_documents(&self) -> bool {
        FolderLoader::from_config(&self.documents)
            .map(|l| l.has_candidates())
            .unwrap_or(false)
    }

    pub async fn load_documents(&self) -> Result<FolderIngest> {
        self.load_documents_with_progress(&NoProgress).await
    }

    /// Load and ingest every supported file under the documents folder.
    /// The folder is created when it does not exist yet.
    pub async fn load_documents_with_progress(&self, progress: &dyn ProgressReporter) -> Result<FolderIngest> {
        let folder = self.documents.folder.clone();
        std::fs::create_dir_all(&folder)
            .with_context(|| format!("failed to create {}", folder.display()))?;

        // The walk is blocking; items reach the ingestor one at a time, in
        // walk order.
        let loader = FolderLoader::from_config(&self.documents)?;
        let (tx, mut rx) = mpsc::channel(LOAD_QUEUE_DEPTH);
        let walk = tokio::task::spawn_blocking(move || {
            let mut iter = loader.iter();
            for item in iter.by_ref() {
                if tx.blocking_send(item).is_err() {
                    break;
                }
            }
            iter.skipped().len()
        });

        let mut report = IngestReport::default();
        while let Some(item) = rx.recv().await {
            self.ingestor.ingest_item(item, &mut report, progress).await;
        }

        let skipped = match walk.await {
            Ok(skipped) => skipped,
            Err(e) => {
                warn!(folder = %folder.display(), error = %e, "document walk stopped early");
                report.failures.push(IngestionError::new(
                    folder.display().to_string(),
                    format!("folder walk stopped: {}", e),
                ));
                0
            }
        };

        info!(
            folder = %folder.display(),
            documents = report.documents,
            chunks = report.chunks,
            failures = report.failures.len(),
            "loaded documents folder"
        );
        Ok(folder_ingest(&folder, report, skipped))
    }

    /// Scrape one page and ingest it.
    pub async fn scrape(&self, url: &str) -> Result<ScrapedPage, IngestionError> {
        let doc = self.scraper.scrape(url).await?;
        let chunks = self.ingestor.ingest(&doc).await?;
        Ok(ScrapedPage {
            url: doc.source_id.clone(),
            title: doc.title.clone(),
            chars: doc.text.chars().count(),
            chunks,
        })
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        self.retriever.retrieve(query, k).await
    }

    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.chunk_count().await
    }

    pub async fn document_count(&self) -> Result<usize> {
        self.store.document_count().await
    }

    pub async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        self.store.list_documents().await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        info!("knowledge base cleared");
        Ok(())
    }

    pub async fn stats(&self) -> Result<KnowledgeStats> {
        KnowledgeStats::collect(
            self.store.as_ref(),
            self.embedder.model_name(),
            self.store_path.as_deref(),
        )
        .await
    }
}

fn folder_ingest(folder: &Path, report: IngestReport, skipped: usize) -> FolderIngest {
    FolderIngest {
        folder: folder.display().to_string(),
        documents: report.documents,
        chunks: report.chunks,
        skipped,
        failures: report.failures.iter().map(FailureView::from).collect(),
    }
}
