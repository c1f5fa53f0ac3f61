//! # waypoint-rag
//!
//! Markdown travel-document ingestion for retrieval-augmented generation:
//! token-budget chunking with overlap, batched embeddings, pgvector
//! persistence, and post-insert parent-chunk linkage.
//!
//! ## Architecture
//!
//! - **[`markdown`]** — frontmatter parsing, heading-delimited section
//!   splitting, reading-time estimate, markdown cleanup
//! - **[`tokenizer`]** — token counting under the embedding model's BPE
//! - **[`chunking`]** — recursive separator-priority splitting, token-budget
//!   packing with overlap, per-section chunking with global indexing
//! - **[`embedding`]** / **[`openai`]** — embedding provider seam, batch
//!   orchestration with rate pacing, OpenAI backend
//! - **[`vectorstore`]** / **[`pgvector`]** / **[`inmemory`]** — chunk store
//!   seam, pgvector backend, in-memory test double
//! - **[`linkage`]** — second-pass parent-chunk relation over persisted rows
//! - **[`pipeline`]** — parse → chunk → embed → persist → link orchestration

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod linkage;
pub mod markdown;
pub mod openai;
pub mod pgvector;
pub mod pipeline;
pub mod tokenizer;
pub mod vectorstore;

pub use chunking::{restamp_total_chunks, TextChunker};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use document::{
    ChunkRef, Document, DocumentMetadata, EmbeddedChunk, PendingChunk, SearchHit, SearchRequest,
    Section,
};
pub use embedding::{EmbeddingBatcher, EmbeddingProvider};
pub use error::{Result, WaypointError};
pub use inmemory::InMemoryChunkStore;
pub use linkage::{LinkageBuilder, LinkageReport};
pub use openai::OpenAiEmbedder;
pub use pgvector::PgChunkStore;
pub use pipeline::{IngestPipeline, IngestPipelineBuilder, IngestReport};
pub use tokenizer::TokenCounter;
pub use vectorstore::ChunkStore;
