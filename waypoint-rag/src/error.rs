//! Error types for the `waypoint-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while ingesting or querying travel content.
#[derive(Debug, Error)]
pub enum WaypointError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the chunk store backend.
    #[error("Store error ({backend}): {message}")]
    Store {
        /// The store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A markdown document could not be parsed.
    #[error("Parse error in {file}: {message}")]
    Parse {
        /// The file that failed to parse.
        file: String,
        /// A description of the failure.
        message: String,
    },

    /// The tokenizer for the configured model could not be loaded.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A startup connectivity check failed. Fatal: nothing is processed.
    #[error("Connectivity check failed ({service}): {message}")]
    Connectivity {
        /// The unreachable service.
        service: String,
        /// A description of the failure.
        message: String,
    },

    /// The input directory contains no markdown files.
    #[error("No markdown files found in {0}")]
    NoInput(PathBuf),

    /// An error in the ingestion pipeline orchestration.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// An I/O error outside per-document containment.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A convenience result type for waypoint operations.
pub type Result<T> = std::result::Result<T, WaypointError>;
