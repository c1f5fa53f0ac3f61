//! Configuration for the ingestion pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WaypointError};

/// Configuration parameters for chunking, embedding, and persistence.
///
/// Construct one at startup and pass it into the components that need it;
/// there is no process-wide configuration state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Maximum chunk size in tokens.
    pub chunk_size: usize,
    /// Number of overlapping tokens between consecutive chunks.
    pub chunk_overlap: usize,
    /// Embedding model name (also selects the tokenizer).
    pub embedding_model: String,
    /// Dimensionality of the embedding vectors.
    pub embedding_dimensions: usize,
    /// Number of texts per embedding request.
    pub embed_batch_size: usize,
    /// Embedding request budget in requests per minute; batches are paced
    /// with a fixed `60 / rate_limit_rpm` second sleep between them.
    pub rate_limit_rpm: u32,
    /// Number of rows per store insert batch.
    pub upload_batch_size: usize,
    /// Store table holding the chunk records.
    pub table_name: String,
    /// Number of top results to return from similarity search.
    pub search_limit: usize,
    /// Minimum similarity for search results.
    pub similarity_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 200,
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_dimensions: 1536,
            embed_batch_size: 100,
            rate_limit_rpm: 3000,
            upload_batch_size: 50,
            table_name: "travel_content".to_string(),
            search_limit: 5,
            similarity_threshold: 0.7,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for constructing a [`PipelineConfig`].
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// Recognized variables: `CHUNK_SIZE`, `CHUNK_OVERLAP`,
    /// `EMBEDDING_MODEL`, `EMBED_BATCH_SIZE`, `RATE_LIMIT_RPM`,
    /// `UPLOAD_BATCH_SIZE`, `TABLE_NAME`.
    ///
    /// # Errors
    ///
    /// Returns [`WaypointError::Config`] if a variable is set but not
    /// parseable, or if the resulting configuration is inconsistent.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Self::builder()
            .chunk_size(env_parse("CHUNK_SIZE", defaults.chunk_size)?)
            .chunk_overlap(env_parse("CHUNK_OVERLAP", defaults.chunk_overlap)?)
            .embed_batch_size(env_parse("EMBED_BATCH_SIZE", defaults.embed_batch_size)?)
            .rate_limit_rpm(env_parse("RATE_LIMIT_RPM", defaults.rate_limit_rpm)?)
            .upload_batch_size(env_parse("UPLOAD_BATCH_SIZE", defaults.upload_batch_size)?);

        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            builder = builder.embedding_model(model);
        }
        if let Ok(table) = std::env::var("TABLE_NAME") {
            builder = builder.table_name(table);
        }

        builder.build()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| WaypointError::Config(format!("{name} is not a valid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

/// Builder for constructing a validated [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the maximum chunk size in tokens.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in tokens.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the embedding model name.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the embedding dimensionality.
    pub fn embedding_dimensions(mut self, dims: usize) -> Self {
        self.config.embedding_dimensions = dims;
        self
    }

    /// Set the number of texts per embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the embedding requests-per-minute budget.
    pub fn rate_limit_rpm(mut self, rpm: u32) -> Self {
        self.config.rate_limit_rpm = rpm;
        self
    }

    /// Set the number of rows per store insert batch.
    pub fn upload_batch_size(mut self, size: usize) -> Self {
        self.config.upload_batch_size = size;
        self
    }

    /// Set the store table name.
    pub fn table_name(mut self, table: impl Into<String>) -> Self {
        self.config.table_name = table.into();
        self
    }

    /// Set the number of top results returned from similarity search.
    pub fn search_limit(mut self, limit: usize) -> Self {
        self.config.search_limit = limit;
        self
    }

    /// Set the minimum similarity threshold for search results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Build the [`PipelineConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`WaypointError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `embed_batch_size == 0` or `upload_batch_size == 0`
    /// - `rate_limit_rpm == 0`
    /// - `search_limit == 0`
    pub fn build(self) -> Result<PipelineConfig> {
        let config = self.config;
        if config.chunk_size == 0 {
            return Err(WaypointError::Config("chunk_size must be greater than zero".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(WaypointError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if config.embed_batch_size == 0 {
            return Err(WaypointError::Config(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        if config.upload_batch_size == 0 {
            return Err(WaypointError::Config(
                "upload_batch_size must be greater than zero".to_string(),
            ));
        }
        if config.rate_limit_rpm == 0 {
            return Err(WaypointError::Config(
                "rate_limit_rpm must be greater than zero".to_string(),
            ));
        }
        if config.search_limit == 0 {
            return Err(WaypointError::Config(
                "search_limit must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}
