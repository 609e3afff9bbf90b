//! SQLite-backed [`VectorStore`].
//!
//! Vectors are stored as little-endian f32 BLOBs next to their chunk text
//! and scored by brute-force cosine distance at query time. Each source is
//! replaced inside one transaction, so readers never see a mix of old and
//! new chunks.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragbot_core::embedding::{blob_to_vec, vec_to_blob};
use ragbot_core::models::{Document, DocumentFormat, EmbeddedChunk, ScoredChunk, StoredDocument};
use ragbot_core::store::{rank_by_distance, VectorStore};
use sqlx::{Row, SqlitePool};

use crate::db;
use crate::migrate;

pub struct SqliteStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the database file in bytes, 0 if it cannot be read.
    pub fn size_bytes(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn replace_source(
        &self,
        doc: &Document,
        chunks: &[EmbeddedChunk],
        model: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE source_id = ?")
            .bind(&doc.source_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE source_id = ?")
            .bind(&doc.source_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO documents (source_id, title, format, chunk_count, ingested_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&doc.source_id)
        .bind(&doc.title)
        .bind(doc.format.as_str())
        .bind(chunks.len() as i64)
        .bind(doc.ingested_at.timestamp())
        .execute(&mut *tx)
        .await?;

        for embedded in chunks {
            let chunk = &embedded.chunk;
            sqlx::query(
                "INSERT INTO chunks (source_id, chunk_offset, chunk_index, text, hash, model, dims, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&doc.source_id)
            .bind(chunk.offset as i64)
            .bind(chunk.index as i64)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(model)
            .bind(embedded.vector.len() as i64)
            .bind(vec_to_blob(&embedded.vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT c.source_id, c.chunk_offset, c.text, c.embedding, d.title
            FROM chunks c
            JOIN documents d ON d.source_id = c.source_id
            ORDER BY c.rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows.iter().map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let offset: i64 = row.get("chunk_offset");
            let chunk = ScoredChunk {
                source_id: row.get("source_id"),
                title: row.get("title"),
                offset: offset as usize,
                text: row.get("text"),
                distance: 0.0,
            };
            (chunk, blob_to_vec(&blob))
        });

        Ok(rank_by_distance(query, candidates, k))
    }

    async fn chunk_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn document_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query(
            "SELECT source_id, title, format, chunk_count, ingested_at FROM documents ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let format: String = row.get("format");
                let chunk_count: i64 = row.get("chunk_count");
                let ingested_at: i64 = row.get("ingested_at");
                Ok(StoredDocument {
                    source_id: row.get("source_id"),
                    title: row.get("title"),
                    format: DocumentFormat::parse(&format)
                        .ok_or_else(|| anyhow::anyhow!("unknown document format '{}'", format))?,
                    chunk_count: chunk_count as usize,
                    ingested_at: DateTime::<Utc>::from_timestamp(ingested_at, 0).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn remove_source(&self, source_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM documents WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed > 0)
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM documents").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
