//! Local embedding provider backed by [fastembed](https://docs.rs/fastembed).
//!
//! This module is only available when the `local` feature is enabled. Models
//! are downloaded once into a cache directory and run in-process through ONNX
//! Runtime. With the `cuda` feature the larger instruction-tuned model is run
//! on the GPU when a CUDA device is present.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use ::fastembed::{InitOptions, TextEmbedding};
use tracing::{debug, info};

use crate::embedding::{EmbeddingModel, EmbeddingProvider};
use crate::error::{RagError, Result};

/// Where a local embedding model runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// ONNX Runtime's default CPU execution.
    Cpu,
    /// CUDA execution through ONNX Runtime.
    Cuda,
}

impl Device {
    /// The best device available to this build.
    pub fn detect() -> Self {
        #[cfg(feature = "cuda")]
        {
            use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
            if CUDAExecutionProvider::default().is_available().unwrap_or(false) {
                return Device::Cuda;
            }
        }
        Device::Cpu
    }
}

/// Default model cache: `$FASTEMBED_CACHE_PATH`, else `~/.cache/fastembed`.
pub fn default_cache_dir() -> PathBuf {
    std::env::var("FASTEMBED_CACHE_PATH")
        .ok()
        .or_else(|| std::env::var("HOME").ok().map(|home| format!("{home}/.cache/fastembed")))
        .unwrap_or_else(|| ".fastembed_cache".to_string())
        .into()
}

/// An [`EmbeddingProvider`] running a sentence-embedding model locally.
///
/// # Example
///
/// ```rust,ignore
/// use ultima_rag::fastembed::{Device, FastEmbedProvider};
/// use ultima_rag::EmbeddingModel;
///
/// let provider = FastEmbedProvider::new(EmbeddingModel::MiniLmL6V2, Device::Cpu, cache_dir)?;
/// let vectors = provider.embed_batch(&["hello", "world"]).await?;
/// ```
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    kind: EmbeddingModel,
    device: Device,
}

impl FastEmbedProvider {
    /// Load `kind` on `device`, downloading the weights into `cache_dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] for the remote ada model, or if
    /// the model cannot be initialized.
    pub fn new(kind: EmbeddingModel, device: Device, cache_dir: PathBuf) -> Result<Self> {
        let model = match kind {
            EmbeddingModel::MiniLmL6V2 => ::fastembed::EmbeddingModel::AllMiniLML6V2,
            EmbeddingModel::NomicEmbedV15 => ::fastembed::EmbeddingModel::NomicEmbedTextV15,
            EmbeddingModel::Ada002 => {
                return Err(RagError::EmbeddingError {
                    provider: "fastembed".into(),
                    message: format!("{kind} is not a local model"),
                });
            }
        };

        #[allow(unused_mut)]
        let mut options = InitOptions::new(model)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(true);

        #[cfg(feature = "cuda")]
        if device == Device::Cuda {
            options = options.with_execution_providers(vec![
                ort::execution_providers::CUDAExecutionProvider::default().build(),
            ]);
        }

        let model = TextEmbedding::try_new(options).map_err(|e| RagError::EmbeddingError {
            provider: "fastembed".into(),
            message: format!("failed to initialize {kind}: {e}"),
        })?;

        info!(model = %kind, ?device, "loaded local embedding model");
        Ok(Self { model: Arc::new(model), kind, device })
    }

    /// The device the model runs on.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Nomic models expect a task prefix on every input.
    fn prefixed(&self, texts: &[&str], prefix: &str) -> Vec<String> {
        match self.kind {
            EmbeddingModel::NomicEmbedV15 => texts.iter().map(|t| format!("{prefix}{t}")).collect(),
            _ => texts.iter().map(|t| t.to_string()).collect(),
        }
    }

    async fn run(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let kind = self.kind;
        debug!(provider = "fastembed", model = %kind, batch_size = inputs.len(), "embedding batch");

        tokio::task::spawn_blocking(move || model.embed(inputs, None))
            .await
            .map_err(|e| RagError::EmbeddingError {
                provider: "fastembed".into(),
                message: format!("embedding task failed: {e}"),
            })?
            .map_err(|e| RagError::EmbeddingError {
                provider: "fastembed".into(),
                message: format!("{kind}: {e}"),
            })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text]).await?.into_iter().next().ok_or_else(|| {
            RagError::EmbeddingError {
                provider: "fastembed".into(),
                message: "model returned no embedding".into(),
            }
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(self.prefixed(texts, "search_document: ")).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.run(self.prefixed(&[text], "search_query: ")).await?.into_iter().next().ok_or_else(
            || RagError::EmbeddingError {
                provider: "fastembed".into(),
                message: "model returned no embedding".into(),
            },
        )
    }

    fn dimensions(&self) -> usize {
        self.kind.dimensions()
    }
}
