//! Embedding provider trait and the closed set of supported embedding models.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (OpenAI, fastembed, etc.)
/// behind a unified async interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use ultima_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Embed a search query.
    ///
    /// Instruction-tuned models prefix queries differently from documents;
    /// everything else embeds queries like any other text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Embedding models known to Ultima.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingModel {
    /// OpenAI `text-embedding-ada-002`, served by the OpenAI API.
    Ada002,
    /// `sentence-transformers/all-MiniLM-L6-v2`, a small model run locally on the CPU.
    MiniLmL6V2,
    /// `nomic-ai/nomic-embed-text-v1.5`, a larger instruction-tuned model run
    /// locally, on the GPU when one is available.
    NomicEmbedV15,
}

impl EmbeddingModel {
    /// Every supported model, in declaration order.
    pub const ALL: [EmbeddingModel; 3] =
        [EmbeddingModel::Ada002, EmbeddingModel::MiniLmL6V2, EmbeddingModel::NomicEmbedV15];

    /// The canonical model identifier.
    pub fn id(self) -> &'static str {
        match self {
            EmbeddingModel::Ada002 => "text-embedding-ada-002",
            EmbeddingModel::MiniLmL6V2 => "sentence-transformers/all-MiniLM-L6-v2",
            EmbeddingModel::NomicEmbedV15 => "nomic-ai/nomic-embed-text-v1.5",
        }
    }

    /// Vector size produced by the model.
    pub fn dimensions(self) -> usize {
        match self {
            EmbeddingModel::Ada002 => 1536,
            EmbeddingModel::MiniLmL6V2 => 384,
            EmbeddingModel::NomicEmbedV15 => 768,
        }
    }

    /// Whether the model runs in-process rather than behind an API.
    pub fn is_local(self) -> bool {
        !matches!(self, EmbeddingModel::Ada002)
    }
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for EmbeddingModel {
    type Err = RagError;

    /// Accepts the full identifier or the part after the last `/`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|model| {
                let id = model.id();
                let short = id.rsplit('/').next().unwrap_or(id);
                id.eq_ignore_ascii_case(s) || short.eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| RagError::ConfigError(format!("Embeddings {s} not supported!")))
    }
}

/// Deterministic embeddings from hashed words, for offline runs and tests.
///
/// Every lowercase word is hashed into one of `dimensions` buckets and the
/// bucket counts are L2-normalized, so texts sharing words point in similar
/// directions.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    /// Create a provider producing vectors of `dimensions` entries.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn bucket(&self, word: &str) -> usize {
        let hash = word.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            embedding[self.bucket(&word.to_lowercase())] += 1.0;
        }
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
