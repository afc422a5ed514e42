//! Vector store trait and distance metrics.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};

/// Distance used to rank stored chunks against a query embedding.
///
/// Distances are turned into scores by negation, so for every metric a
/// higher score means a closer match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity.
    #[default]
    Cos,
    /// Euclidean distance.
    #[serde(rename = "L2")]
    L2,
    /// Manhattan distance.
    #[serde(rename = "L1")]
    L1,
    /// Chebyshev (maximum coordinate) distance.
    Max,
}

impl DistanceMetric {
    /// Every supported metric.
    pub const ALL: [DistanceMetric; 4] =
        [DistanceMetric::Cos, DistanceMetric::L2, DistanceMetric::L1, DistanceMetric::Max];

    /// The short name used in options and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            DistanceMetric::Cos => "cos",
            DistanceMetric::L2 => "L2",
            DistanceMetric::L1 => "L1",
            DistanceMetric::Max => "max",
        }
    }

    /// Score `candidate` against `query`; higher is more relevant.
    pub fn score(self, query: &[f32], candidate: &[f32]) -> f32 {
        let pairs = query.iter().zip(candidate.iter());
        match self {
            DistanceMetric::Cos => cosine_similarity(query, candidate),
            DistanceMetric::L2 => -pairs.map(|(a, b)| (a - b) * (a - b)).sum::<f32>().sqrt(),
            DistanceMetric::L1 => -pairs.map(|(a, b)| (a - b).abs()).sum::<f32>(),
            DistanceMetric::Max => -pairs.map(|(a, b)| (a - b).abs()).fold(0.0, f32::max),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cos" | "cosine" => Ok(DistanceMetric::Cos),
            "l2" => Ok(DistanceMetric::L2),
            "l1" => Ok(DistanceMetric::L1),
            "max" => Ok(DistanceMetric::Max),
            _ => Err(RagError::ConfigError(format!(
                "unknown distance metric '{s}', expected one of cos, L2, L1, max"
            ))),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Score every chunk against `embedding` and keep the `top_k` best.
pub(crate) fn rank(
    chunks: impl Iterator<Item = Chunk>,
    embedding: &[f32],
    top_k: usize,
    metric: DistanceMetric,
) -> Vec<SearchResult> {
    let mut scored: Vec<SearchResult> = chunks
        .map(|chunk| {
            let score = metric.score(embedding, &chunk.embedding);
            SearchResult { chunk, score }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    scored
}

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`Chunk`]s and support
/// upserting, deleting, and searching by vector similarity.
///
/// # Example
///
/// ```rust,ignore
/// use ultima_rag::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 384).await?;
/// store.upsert("docs", &chunks).await?;
/// let results = store.search("docs", &query_embedding, 5, DistanceMetric::Cos).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether a collection with this name exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Upsert chunks into a collection. Chunks must have embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete chunks by their IDs from a collection.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Search for the `top_k` chunks closest to the given embedding.
    ///
    /// Returns results ordered by descending score, with each chunk's
    /// embedding attached so callers can re-rank them.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<SearchResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metric_names() {
        for metric in DistanceMetric::ALL {
            assert_eq!(metric.as_str().parse::<DistanceMetric>().unwrap(), metric);
        }
        assert_eq!("l2".parse::<DistanceMetric>().unwrap(), DistanceMetric::L2);
        assert!("hamming".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn closer_vectors_score_higher_for_every_metric() {
        let query = [1.0, 0.0];
        let near = [0.9, 0.1];
        let far = [-1.0, 0.5];
        for metric in DistanceMetric::ALL {
            assert!(metric.score(&query, &near) > metric.score(&query, &far), "{metric}");
        }
    }

    #[test]
    fn distances_are_negated() {
        assert_eq!(DistanceMetric::L1.score(&[0.0, 0.0], &[1.0, -2.0]), -3.0);
        assert_eq!(DistanceMetric::Max.score(&[0.0, 0.0], &[1.0, -2.0]), -2.0);
        assert_eq!(DistanceMetric::L2.score(&[0.0, 0.0], &[3.0, 4.0]), -5.0);
    }

    #[test]
    fn zero_vector_has_zero_cosine() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn metric_serializes_to_short_name() {
        assert_eq!(serde_json::to_string(&DistanceMetric::Cos).unwrap(), "\"cos\"");
        assert_eq!(serde_json::to_string(&DistanceMetric::L2).unwrap(), "\"L2\"");
    }
}
