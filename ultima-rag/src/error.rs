//! Error types for the `ultima-rag` crate.

use thiserror::Error;

/// Errors that can occur while loading, splitting, embedding or indexing documents.
#[derive(Debug, Error)]
pub enum RagError {
    /// A data source could not be turned into documents at all.
    ///
    /// The message carries guidance for the user (including where to ask for
    /// support of new source types).
    #[error("Failed to load data source '{source_name}': {message}")]
    DataSource {
        /// The data source as entered by the user.
        source_name: String,
        /// A description of the failure.
        message: String,
    },

    /// A single file or URL failed to load.
    #[error("Failed to load '{path}': {message}")]
    Load {
        /// The file path or URL.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The content could not be interpreted by any parser.
    #[error("Unsupported content in '{path}': {reason}")]
    UnsupportedFormat {
        /// The file path or URL.
        path: String,
        /// Why the content was rejected.
        reason: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during document chunking.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// A tokenizer could not be created or failed to encode text.
    #[error("Tokenizer error ({tokenizer}): {message}")]
    TokenizerError {
        /// The tokenizer that produced the error.
        tokenizer: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the ingest/retrieval orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// An I/O error from the local filesystem.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
