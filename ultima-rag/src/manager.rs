//! Create-or-reuse management of datasets.
//!
//! The [`VectorStoreManager`] turns a data source into a searchable
//! collection. The dataset identity is computed first; if a collection with
//! that identity exists it is reused as is, otherwise the source is loaded,
//! split, embedded and stored (load → split → embed → store).
//!
//! # Example
//!
//! ```rust,ignore
//! use ultima_rag::{IndexConfig, InMemoryVectorStore, VectorStoreManager};
//!
//! let manager = VectorStoreManager::builder()
//!     .config(IndexConfig::builder().org("acme").build()?)
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .tokenizer(Arc::new(my_tokenizer))
//!     .build()?;
//!
//! let index = manager.get_vector_store("./docs").await?;
//! let retriever = manager.retriever(&index, SearchParams::default())?;
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::chunking::{TokenChunker, split_documents};
use crate::config::IndexConfig;
use crate::dataset::{DatasetPath, get_dataset_path};
use crate::document::Chunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::loader::load_data_source;
use crate::retriever::{SearchParams, VectorStoreRetriever};
use crate::tokenizer::Tokenizer;
use crate::vectorstore::VectorStore;

/// Number of chunks sent to the embedding provider at once.
const EMBED_BATCH_SIZE: usize = 128;

/// A dataset ready for retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetIndex {
    /// The dataset identity.
    pub path: DatasetPath,
    /// The vector store collection holding the dataset.
    pub collection: String,
    /// Whether the dataset was built by this call rather than reused.
    pub created: bool,
}

/// Builds datasets on first use and reuses them afterwards.
///
/// Construct one via [`VectorStoreManager::builder()`].
pub struct VectorStoreManager {
    config: IndexConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<TokenChunker>,
}

impl VectorStoreManager {
    /// Create a new [`VectorStoreManagerBuilder`].
    pub fn builder() -> VectorStoreManagerBuilder {
        VectorStoreManagerBuilder::default()
    }

    /// Return a reference to the index configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// The identity of the dataset `source` maps to under this configuration.
    pub fn dataset_path(&self, source: &str) -> DatasetPath {
        get_dataset_path(
            source,
            self.config.chunk_size,
            self.config.chunk_overlap,
            self.config.mode,
            &self.config.org,
            &self.config.data_dir,
        )
    }

    /// Open the dataset for `source`, building it if it does not exist yet.
    ///
    /// An existing dataset is opened without touching the data source. The
    /// embedding provider must be the one the dataset was built with; this is
    /// not checked.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DataSource`] if the source cannot be loaded and
    /// [`RagError::PipelineError`] if embedding or storage fails.
    pub async fn get_vector_store(&self, source: &str) -> Result<DatasetIndex> {
        let path = self.dataset_path(source);
        let collection = path.collection_name();

        if self.vector_store.collection_exists(&collection).await? {
            info!(dataset = %path, "dataset exists, loading");
            return Ok(DatasetIndex { path, collection, created: false });
        }

        info!(dataset = %path, "dataset does not exist, creating");
        let documents = load_data_source(source).await?;

        let chunker = Arc::clone(&self.chunker);
        let chunks =
            tokio::task::spawn_blocking(move || split_documents(&documents, chunker.as_ref()))
                .await
                .map_err(|e| RagError::PipelineError(format!("splitting task failed: {e}")))??;

        let chunks = self.embed(chunks).await?;
        self.store(&collection, &chunks).await?;

        info!(dataset = %path, chunk_count = chunks.len(), "created dataset");
        Ok(DatasetIndex { path, collection, created: true })
    }

    /// A retriever over `index` using this manager's embedding provider.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `params` are inconsistent.
    pub fn retriever(
        &self,
        index: &DatasetIndex,
        params: SearchParams,
    ) -> Result<VectorStoreRetriever> {
        VectorStoreRetriever::new(
            Arc::clone(&self.vector_store),
            Arc::clone(&self.embedding_provider),
            index.collection.clone(),
            params,
        )
    }

    async fn embed(&self, mut chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        let total = chunks.len();
        for (batch_no, batch) in chunks.chunks_mut(EMBED_BATCH_SIZE).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                error!(error = %e, "embedding failed during ingestion");
                RagError::PipelineError(format!("embedding failed: {e}"))
            })?;

            if embeddings.len() != batch.len() {
                return Err(RagError::PipelineError(format!(
                    "embedding provider returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }
            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }

            let done = ((batch_no + 1) * EMBED_BATCH_SIZE).min(total);
            info!(embedded = done, total, "embedding chunks");
        }
        Ok(chunks)
    }

    async fn store(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store.create_collection(collection, dimensions).await.map_err(|e| {
            error!(collection, error = %e, "failed to create collection");
            RagError::PipelineError(format!("failed to create collection '{collection}': {e}"))
        })?;

        if let Err(e) = self.vector_store.upsert(collection, chunks).await {
            error!(collection, error = %e, "upsert failed during ingestion");
            // A half-written collection would be reused on the next call.
            if let Err(cleanup) = self.vector_store.delete_collection(collection).await {
                warn!(collection, error = %cleanup, "failed to remove incomplete collection");
            }
            return Err(RagError::PipelineError(format!(
                "failed to store chunks in '{collection}': {e}"
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a [`VectorStoreManager`].
///
/// All fields are required. Call [`build()`](VectorStoreManagerBuilder::build)
/// to validate and produce the manager.
#[derive(Default)]
pub struct VectorStoreManagerBuilder {
    config: Option<IndexConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl VectorStoreManagerBuilder {
    /// Set the index configuration.
    pub fn config(mut self, config: IndexConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the tokenizer of the embedding model, used to measure chunks.
    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Build the [`VectorStoreManager`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing or
    /// the chunking parameters are inconsistent.
    pub fn build(self) -> Result<VectorStoreManager> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let tokenizer = self
            .tokenizer
            .ok_or_else(|| RagError::ConfigError("tokenizer is required".to_string()))?;

        let chunker = TokenChunker::new(config.chunk_size, config.chunk_overlap, tokenizer)?;

        Ok(VectorStoreManager {
            config,
            embedding_provider,
            vector_store,
            chunker: Arc::new(chunker),
        })
    }
}
