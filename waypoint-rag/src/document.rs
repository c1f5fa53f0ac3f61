//! Data types for documents, sections, chunks, and search results.
//!
//! A chunk has two lifecycle phases: [`PendingChunk`] (no store identifier,
//! no parent link) and the persisted record, which acquires a store-assigned
//! id on insert and a `parent_chunk_id` in the follow-up linkage pass.

use serde::{Deserialize, Serialize};

/// Document-level metadata, denormalized onto every chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    /// Document title, from frontmatter or the file stem.
    pub title: String,
    /// Source file name.
    pub file_name: String,
    /// Content category used for search filtering.
    pub category: String,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Geographic location the document covers.
    pub location: String,
    /// Estimated reading time of the full document, in seconds.
    pub estimated_reading_time: u32,
}

/// A parsed markdown document. Immutable once parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Metadata extracted from frontmatter and the file itself.
    pub metadata: DocumentMetadata,
    /// The full body text, frontmatter removed.
    pub body: String,
    /// Heading-delimited sections, in reading order.
    pub sections: Vec<Section>,
}

/// A contiguous span of a document bounded by heading markers.
///
/// Sections form a flat sequence; `level` is metadata, not nesting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    /// Heading text; empty for a preamble section.
    pub title: String,
    /// Heading level 1–6, or 0 for the preamble before the first heading.
    pub level: u8,
    /// Body text, lines joined and trimmed.
    pub body: String,
}

/// A chunk produced by the chunker, not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingChunk {
    /// Chunk text, trimmed of leading/trailing whitespace.
    pub content: String,
    /// Zero-based position within the document's full chunk sequence.
    pub chunk_index: usize,
    /// Count of chunks in the same document.
    pub total_chunks: usize,
    /// Token count of `content`.
    pub token_count: usize,
    /// Title of the section this chunk came from, if section-derived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    /// Heading level of the source section, if section-derived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_level: Option<u8>,
    /// Document metadata copied onto the chunk.
    #[serde(flatten)]
    pub metadata: DocumentMetadata,
}

/// A chunk paired with its embedding vector, ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    /// The chunk record.
    pub chunk: PendingChunk,
    /// The embedding vector for the chunk's content.
    pub embedding: Vec<f32>,
}

/// The projection of a persisted chunk used by the linkage builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRef {
    /// Store-assigned identifier.
    pub id: i64,
    /// Source file name the chunk belongs to.
    pub file_name: String,
    /// Position within the document's chunk sequence.
    pub chunk_index: usize,
}

/// Parameters for a similarity search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Maximum number of results.
    pub limit: usize,
    /// Minimum similarity (1 − cosine distance) for a result to qualify.
    pub threshold: f32,
    /// Restrict results to a category, if set.
    pub category: Option<String>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self { limit: 5, threshold: 0.7, category: None }
    }
}

/// A persisted chunk returned from similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Store-assigned identifier.
    pub id: i64,
    /// Chunk text.
    pub content: String,
    /// Document title.
    pub title: String,
    /// Source file name.
    pub file_name: String,
    /// Content category.
    pub category: String,
    /// Section title, if the chunk was section-derived.
    pub section_title: Option<String>,
    /// Position within the document's chunk sequence.
    pub chunk_index: usize,
    /// Chunk count of the document at upload time.
    pub total_chunks: usize,
    /// Similarity score (1 − cosine distance), higher is closer.
    pub similarity: f32,
}
