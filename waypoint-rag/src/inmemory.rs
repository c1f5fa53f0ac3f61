//! In-memory chunk store using cosine similarity.
//!
//! This module provides [`InMemoryChunkStore`], a zero-infrastructure store
//! backed by a `Vec` behind a `tokio::sync::RwLock`. It assigns sequential
//! integer identifiers on insert, standing in for a database's
//! server-assigned ids, which makes the post-persistence linkage pass fully
//! testable offline.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{ChunkRef, EmbeddedChunk, SearchHit, SearchRequest};
use crate::error::Result;
use crate::vectorstore::ChunkStore;

/// A persisted row as held by the in-memory store.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    /// Assigned identifier.
    pub id: i64,
    /// The embedded chunk as inserted.
    pub chunk: EmbeddedChunk,
    /// Parent link, set by the linkage pass.
    pub parent_chunk_id: Option<i64>,
}

#[derive(Debug, Default)]
struct StoreInner {
    next_id: i64,
    rows: Vec<StoredRecord>,
}

/// An in-memory [`ChunkStore`] for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryChunkStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryChunkStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all persisted rows, in insertion order.
    pub async fn records(&self) -> Vec<StoredRecord> {
        self.inner.read().await.rows.clone()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn setup(&self, _dimensions: usize) -> Result<()> {
        Ok(())
    }

    async fn insert_batch(&self, chunks: &[EmbeddedChunk]) -> Result<usize> {
        let mut inner = self.inner.write().await;
        for chunk in chunks {
            inner.next_id += 1;
            let id = inner.next_id;
            inner.rows.push(StoredRecord { id, chunk: chunk.clone(), parent_chunk_id: None });
        }
        Ok(chunks.len())
    }

    async fn fetch_chunk_refs(&self) -> Result<Vec<ChunkRef>> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .iter()
            .map(|row| ChunkRef {
                id: row.id,
                file_name: row.chunk.chunk.metadata.file_name.clone(),
                chunk_index: row.chunk.chunk.chunk_index,
            })
            .collect())
    }

    async fn set_parent(&self, id: i64, parent_id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(row) = inner.rows.iter_mut().find(|row| row.id == id) {
            row.parent_chunk_id = Some(parent_id);
        }
        Ok(())
    }

    async fn search(&self, embedding: &[f32], request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let inner = self.inner.read().await;

        let mut hits: Vec<SearchHit> = inner
            .rows
            .iter()
            .filter(|row| {
                request
                    .category
                    .as_deref()
                    .is_none_or(|category| row.chunk.chunk.metadata.category == category)
            })
            .map(|row| {
                let chunk = &row.chunk.chunk;
                SearchHit {
                    id: row.id,
                    content: chunk.content.clone(),
                    title: chunk.metadata.title.clone(),
                    file_name: chunk.metadata.file_name.clone(),
                    category: chunk.metadata.category.clone(),
                    section_title: chunk.section_title.clone(),
                    chunk_index: chunk.chunk_index,
                    total_chunks: chunk.total_chunks,
                    similarity: cosine_similarity(&row.chunk.embedding, embedding),
                }
            })
            .filter(|hit| hit.similarity > request.threshold)
            .collect();

        hits.sort_by(|a, b| {
            b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(request.limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.inner.read().await.rows.len() as u64)
    }

    async fn clear(&self) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let removed = inner.rows.len() as u64;
        inner.rows.clear();
        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
