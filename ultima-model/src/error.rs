//! Error types for language model providers.

use thiserror::Error;

/// Errors returned by [`Llm`](crate::Llm) implementations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model was configured with missing or invalid settings.
    #[error("Invalid model configuration: {0}")]
    Config(String),

    /// The remote API rejected the request or could not be reached.
    #[error("{provider} API error: {message}")]
    Api {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The weights of a local model are missing.
    #[error("Model not found: {path}")]
    ModelNotFound {
        /// Path that was searched.
        path: String,
    },

    /// Local inference failed.
    #[error("Inference error: {0}")]
    Inference(String),
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
