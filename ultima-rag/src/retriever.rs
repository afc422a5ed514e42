//! Query-time retrieval over a vector store.
//!
//! [`VectorStoreRetriever`] embeds a question, fetches candidates from a
//! collection and optionally re-ranks them with maximal marginal relevance so
//! the returned chunks are relevant without repeating each other.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::{DistanceMetric, VectorStore, cosine_similarity};

/// Weight of relevance against diversity in maximal marginal relevance.
const MMR_LAMBDA: f32 = 0.5;

/// How many chunks to retrieve and how to pick them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Number of chunks returned.
    pub k: usize,
    /// Number of candidates scanned before diversity re-ranking.
    pub fetch_k: usize,
    /// Re-rank candidates with maximal marginal relevance.
    pub maximal_marginal_relevance: bool,
    /// Distance used to score candidates.
    pub distance_metric: DistanceMetric,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            k: 26,
            fetch_k: 26,
            maximal_marginal_relevance: true,
            distance_metric: DistanceMetric::Cos,
        }
    }
}

impl SearchParams {
    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `k == 0` or `fetch_k < k`.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }
        if self.fetch_k < self.k {
            return Err(RagError::ConfigError(format!(
                "fetch_k ({}) must be at least k ({})",
                self.fetch_k, self.k
            )));
        }
        Ok(())
    }
}

/// Retrieves the chunks most relevant to a query from one collection.
///
/// The embedding provider must be the one the collection was built with.
///
/// # Example
///
/// ```rust,ignore
/// use ultima_rag::{SearchParams, VectorStoreRetriever};
///
/// let params = SearchParams::default();
/// let retriever = VectorStoreRetriever::new(store, embedder, "notes-txt-1536-128", params)?;
/// let chunks = retriever.retrieve("What is in my notes?").await?;
/// ```
pub struct VectorStoreRetriever {
    vector_store: Arc<dyn VectorStore>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    collection: String,
    params: SearchParams,
}

impl VectorStoreRetriever {
    /// Create a retriever over `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `params` are inconsistent.
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        collection: impl Into<String>,
        params: SearchParams,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self { vector_store, embedding_provider, collection: collection.into(), params })
    }

    /// The search parameters in use.
    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// The collection searched.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Return at most `k` chunks for `query`, most relevant first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        let embedding = self.embedding_provider.embed_query(query).await?;

        let fetch = if self.params.maximal_marginal_relevance {
            self.params.fetch_k
        } else {
            self.params.k
        };

        let candidates = self
            .vector_store
            .search(&self.collection, &embedding, fetch, self.params.distance_metric)
            .await?;
        let fetched = candidates.len();

        let results = if self.params.maximal_marginal_relevance {
            maximal_marginal_relevance(&embedding, candidates, self.params.k, MMR_LAMBDA)
        } else {
            let mut candidates = candidates;
            candidates.truncate(self.params.k);
            candidates
        };

        debug!(
            collection = %self.collection,
            fetched,
            returned = results.len(),
            mmr = self.params.maximal_marginal_relevance,
            "retrieved chunks"
        );
        Ok(results)
    }
}

/// Select `k` candidates balancing similarity to the query against
/// similarity to the candidates already selected.
///
/// The selection order is kept: the first result is the most relevant
/// candidate, later ones trade relevance for novelty.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: Vec<SearchResult>,
    k: usize,
    lambda: f32,
) -> Vec<SearchResult> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let relevance: Vec<f32> =
        candidates.iter().map(|c| cosine_similarity(query, &c.chunk.embedding)).collect();
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));

    while selected.len() < k && !remaining.is_empty() {
        let mut best = (0, f32::NEG_INFINITY);
        for (slot, &idx) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| {
                    cosine_similarity(
                        &candidates[idx].chunk.embedding,
                        &candidates[s].chunk.embedding,
                    )
                })
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };
            let score = lambda * relevance[idx] - (1.0 - lambda) * redundancy;
            if score > best.1 {
                best = (slot, score);
            }
        }
        selected.push(remaining.remove(best.0));
    }

    let mut slots: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
    selected.into_iter().filter_map(|idx| slots[idx].take()).collect()
}
