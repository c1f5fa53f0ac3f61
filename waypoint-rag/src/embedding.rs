//! Embedding provider boundary and batch orchestration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::chunking::restamp_total_chunks;
use crate::config::PipelineConfig;
use crate::document::{EmbeddedChunk, PendingChunk};
use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// Order-preserving: the `i`-th output corresponds to the `i`-th input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Runs chunk texts through an [`EmbeddingProvider`] in fixed-size batches.
///
/// A failed batch yields an absent embedding for every member — there is no
/// retry. Between batches a fixed delay derived from the requests-per-minute
/// budget paces calls against the provider's throughput ceiling.
pub struct EmbeddingBatcher {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    delay: Duration,
}

impl EmbeddingBatcher {
    /// Create a batcher from the pipeline configuration.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            batch_size: config.embed_batch_size,
            delay: Duration::from_secs_f64(60.0 / f64::from(config.rate_limit_rpm)),
        }
    }

    /// Embed `texts` in batches, preserving input order.
    ///
    /// Returns one entry per input: `Some(vector)` on success, `None` for
    /// every member of a failed batch.
    pub async fn embed_texts(&self, texts: &[&str]) -> Vec<Option<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        let batch_count = texts.len().div_ceil(self.batch_size.max(1));

        for (batch_no, batch) in texts.chunks(self.batch_size.max(1)).enumerate() {
            match self.provider.embed_batch(batch).await {
                Ok(vectors) if vectors.len() == batch.len() => {
                    embeddings.extend(vectors.into_iter().map(Some));
                }
                Ok(vectors) => {
                    warn!(
                        batch = batch_no + 1,
                        expected = batch.len(),
                        returned = vectors.len(),
                        "embedding batch returned a mismatched count, dropping batch"
                    );
                    embeddings.extend(std::iter::repeat_with(|| None).take(batch.len()));
                }
                Err(e) => {
                    warn!(batch = batch_no + 1, error = %e, "embedding batch failed, dropping batch");
                    embeddings.extend(std::iter::repeat_with(|| None).take(batch.len()));
                }
            }

            if batch_no + 1 < batch_count {
                tokio::time::sleep(self.delay).await;
            }
        }

        embeddings
    }

    /// Embed a chunk sequence and drop every chunk whose batch failed.
    ///
    /// Surviving chunks keep their original `chunk_index` values;
    /// `total_chunks` is re-stamped per file to the surviving count.
    /// Returns the embedded chunks and the number dropped.
    pub async fn embed_chunks(&self, chunks: Vec<PendingChunk>) -> (Vec<EmbeddedChunk>, usize) {
        let embeddings = {
            let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
            self.embed_texts(&texts).await
        };

        let mut embedded = Vec::new();
        let mut skipped = 0;
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            match embedding {
                Some(embedding) => embedded.push(EmbeddedChunk { chunk, embedding }),
                None => {
                    warn!(
                        file = %chunk.metadata.file_name,
                        chunk_index = chunk.chunk_index,
                        "dropping chunk without embedding"
                    );
                    skipped += 1;
                }
            }
        }

        restamp_total_chunks(&mut embedded);
        info!(embedded = embedded.len(), skipped, "embedding pass complete");
        (embedded, skipped)
    }
}
