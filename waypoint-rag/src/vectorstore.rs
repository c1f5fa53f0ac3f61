//! Chunk store trait: persistence and similarity search for embedded chunks.

use async_trait::async_trait;

use crate::document::{ChunkRef, EmbeddedChunk, SearchHit, SearchRequest};
use crate::error::Result;

/// A storage backend for embedded chunks with similarity search.
///
/// The store assigns integer identifiers on insert; chunk records go in
/// without a parent link and receive one in a follow-up pass via
/// [`set_parent`](ChunkStore::set_parent) once identifiers exist.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Create the backing table and indexes. No-op if they already exist.
    async fn setup(&self, dimensions: usize) -> Result<()>;

    /// Insert a batch of embedded chunks atomically.
    ///
    /// Returns the number of rows confirmed written. A failed batch leaves
    /// no rows behind and does not prevent later batches from being tried.
    async fn insert_batch(&self, chunks: &[EmbeddedChunk]) -> Result<usize>;

    /// Fetch the id/file/index projection of every persisted chunk.
    async fn fetch_chunk_refs(&self) -> Result<Vec<ChunkRef>>;

    /// Point a persisted chunk at its parent by store identifier.
    async fn set_parent(&self, id: i64, parent_id: i64) -> Result<()>;

    /// Similarity search: results ordered by descending similarity
    /// (1 − cosine distance), filtered by the request's threshold and
    /// optional category.
    async fn search(&self, embedding: &[f32], request: &SearchRequest) -> Result<Vec<SearchHit>>;

    /// Total number of persisted chunks.
    async fn count(&self) -> Result<u64>;

    /// Delete all persisted chunks, returning the number removed.
    async fn clear(&self) -> Result<u64>;

    /// Connectivity probe, used as a startup precondition.
    async fn ping(&self) -> Result<()>;
}
