//! Error types for chat sessions.

use thiserror::Error;
use ultima_model::ModelError;
use ultima_rag::RagError;

/// Errors surfaced to the session layer.
#[derive(Debug, Error)]
pub enum ChatError {
    /// An option value or a model/embedding combination is not supported.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credentials are missing or were rejected by a service.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Building the retrieval chain failed.
    #[error("Failed to build chain for source '{data_source}' with model '{model}': {message}")]
    Build {
        data_source: String,
        model: String,
        message: String,
    },

    /// A question was asked before a chain was built.
    #[error("No chain has been built yet")]
    NoChain,

    #[error(transparent)]
    Rag(#[from] RagError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result type for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
