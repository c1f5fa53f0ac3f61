//! Ingestion pipeline orchestrator.
//!
//! [`IngestPipeline`] coordinates the full parse → chunk → embed → persist
//! → link workflow by composing an [`EmbeddingProvider`], a [`ChunkStore`],
//! and a [`TextChunker`]. Each stage consumes the full output of the
//! previous stage across the whole document set; there is no cross-document
//! interleaving.
//!
//! # Example
//!
//! ```rust,ignore
//! use waypoint_rag::{IngestPipeline, PipelineConfig};
//!
//! let pipeline = IngestPipeline::builder()
//!     .config(PipelineConfig::from_env()?)
//!     .embedder(Arc::new(embedder))
//!     .store(Arc::new(store))
//!     .build()?;
//!
//! let report = pipeline.run(Path::new("markdown_files")).await?;
//! println!("{} chunks uploaded", report.chunks_uploaded);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::chunking::TextChunker;
use crate::config::PipelineConfig;
use crate::document::{PendingChunk, SearchHit, SearchRequest};
use crate::embedding::{EmbeddingBatcher, EmbeddingProvider};
use crate::error::{Result, WaypointError};
use crate::linkage::LinkageBuilder;
use crate::markdown;
use crate::tokenizer::TokenCounter;
use crate::vectorstore::ChunkStore;

/// Counters describing one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    /// Documents parsed and chunked.
    pub documents_processed: usize,
    /// Documents skipped because they could not be read or parsed.
    pub documents_skipped: usize,
    /// Chunks produced by the chunker.
    pub chunks_created: usize,
    /// Chunks dropped because their embedding batch failed.
    pub chunks_dropped: usize,
    /// Chunks that received an embedding.
    pub chunks_embedded: usize,
    /// Rows confirmed written by the store.
    pub chunks_uploaded: usize,
    /// Whether every embedded chunk was confirmed written.
    pub upload_complete: bool,
    /// Parent links written by the linkage pass.
    pub links_created: usize,
    /// Parent link updates that failed.
    pub link_failures: usize,
    /// Total rows in the store after the run.
    pub store_total: u64,
}

/// The ingestion pipeline orchestrator.
///
/// Construct one via [`IngestPipeline::builder()`].
pub struct IngestPipeline {
    config: PipelineConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn ChunkStore>,
    chunker: TextChunker,
}

impl IngestPipeline {
    /// Create a new [`IngestPipelineBuilder`].
    pub fn builder() -> IngestPipelineBuilder {
        IngestPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Return a reference to the chunk store.
    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Ingest every markdown file under `dir`.
    ///
    /// Per-document parse failures and per-batch embedding or upload
    /// failures are contained and counted in the report; the run aborts
    /// only on the startup connectivity checks, an unreadable directory,
    /// or a directory with no markdown files.
    ///
    /// # Errors
    ///
    /// Returns [`WaypointError::Connectivity`] when the embedding provider
    /// or store is unreachable, and [`WaypointError::NoInput`] when `dir`
    /// holds no `.md` files.
    pub async fn run(&self, dir: &Path) -> Result<IngestReport> {
        self.preflight().await?;

        let files = markdown_files(dir)?;
        info!(count = files.len(), dir = %dir.display(), "found markdown files");

        let mut report = IngestReport::default();
        let mut all_chunks: Vec<PendingChunk> = Vec::new();

        for path in &files {
            match self.process_file(path).await {
                Ok(chunks) => {
                    info!(file = %path.display(), chunk_count = chunks.len(), "chunked document");
                    report.documents_processed += 1;
                    all_chunks.extend(chunks);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping document");
                    report.documents_skipped += 1;
                }
            }
        }
        report.chunks_created = all_chunks.len();

        if all_chunks.is_empty() {
            info!("no chunks produced, nothing to upload");
            report.upload_complete = true;
            report.store_total = self.store.count().await?;
            return Ok(report);
        }

        let batcher = EmbeddingBatcher::new(self.embedder.clone(), &self.config);
        let (embedded, dropped) = batcher.embed_chunks(all_chunks).await;
        report.chunks_embedded = embedded.len();
        report.chunks_dropped = dropped;

        let attempted = embedded.len();
        let mut uploaded = 0;
        for (batch_no, batch) in embedded.chunks(self.config.upload_batch_size).enumerate() {
            match self.store.insert_batch(batch).await {
                Ok(written) => uploaded += written,
                Err(e) => {
                    warn!(batch = batch_no + 1, error = %e, "upload batch failed");
                }
            }
        }
        report.chunks_uploaded = uploaded;
        report.upload_complete = uploaded == attempted;
        info!(uploaded, attempted, "upload pass complete");

        let linkage = LinkageBuilder::new(self.store.as_ref()).link_parents().await?;
        report.links_created = linkage.links_created;
        report.link_failures = linkage.failures;

        report.store_total = self.store.count().await?;
        info!(
            documents = report.documents_processed,
            uploaded = report.chunks_uploaded,
            store_total = report.store_total,
            "ingestion complete"
        );
        Ok(report)
    }

    /// Embed `query` and run a similarity search against the store.
    ///
    /// # Errors
    ///
    /// Returns [`WaypointError::Embedding`] if the query embedding fails,
    /// or [`WaypointError::Store`] if the search fails.
    pub async fn search(&self, query: &str, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let embedding = self.embedder.embed(query).await?;
        self.store.search(&embedding, request).await
    }

    /// Fail-fast startup checks: both external services must answer before
    /// any document is touched.
    async fn preflight(&self) -> Result<()> {
        let probe =
            self.embedder.embed("connectivity probe").await.map_err(|e| {
                WaypointError::Connectivity { service: "embeddings".to_string(), message: e.to_string() }
            })?;
        if probe.len() != self.config.embedding_dimensions {
            return Err(WaypointError::Connectivity {
                service: "embeddings".to_string(),
                message: format!(
                    "expected {} dimensions, got {}",
                    self.config.embedding_dimensions,
                    probe.len()
                ),
            });
        }

        self.store.ping().await.map_err(|e| WaypointError::Connectivity {
            service: "store".to_string(),
            message: e.to_string(),
        })?;

        info!("connectivity checks passed");
        Ok(())
    }

    async fn process_file(&self, path: &Path) -> Result<Vec<PendingChunk>> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let content =
            tokio::fs::read_to_string(path).await.map_err(|e| WaypointError::Parse {
                file: file_name.clone(),
                message: format!("failed to read: {e}"),
            })?;

        let document = markdown::parse_document(&file_name, &content)?;

        let chunks = if document.sections.is_empty() {
            self.chunker.chunk(&document.body, &document.metadata)
        } else {
            self.chunker.chunk_sections(&document.sections, &document.metadata)
        };

        for chunk in &chunks {
            if !self.chunker.within_budget(&chunk.content) {
                warn!(
                    file = %file_name,
                    chunk_index = chunk.chunk_index,
                    tokens = chunk.token_count,
                    "chunk exceeds the soft token budget"
                );
            }
        }
        Ok(chunks)
    }
}

/// List the markdown files in `dir`, sorted for a deterministic run order.
fn markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(WaypointError::NoInput(dir.to_path_buf()));
    }
    Ok(files)
}

/// Builder for constructing an [`IngestPipeline`].
///
/// `config`, `embedder`, and `store` are required. The tokenizer and
/// chunker are derived from the configuration at build time.
#[derive(Default)]
pub struct IngestPipelineBuilder {
    config: Option<PipelineConfig>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn ChunkStore>>,
}

impl IngestPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the chunk store backend.
    pub fn store(mut self, store: Arc<dyn ChunkStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the [`IngestPipeline`], validating that all required fields
    /// are set and that the configured model has a known tokenizer.
    ///
    /// # Errors
    ///
    /// Returns [`WaypointError::Config`] if a required field is missing, or
    /// [`WaypointError::Tokenizer`] if the tokenizer cannot be loaded.
    pub fn build(self) -> Result<IngestPipeline> {
        let config =
            self.config.ok_or_else(|| WaypointError::Config("config is required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| WaypointError::Config("embedder is required".to_string()))?;
        let store =
            self.store.ok_or_else(|| WaypointError::Config("store is required".to_string()))?;

        let counter = TokenCounter::for_model(&config.embedding_model)?;
        let chunker = TextChunker::new(&config, counter);

        Ok(IngestPipeline { config, embedder, store, chunker })
    }
}
