//! # ultima-rag
//!
//! The retrieval half of Ultima: everything between a data source and the
//! chunks handed to a language model.
//!
//! ## Overview
//!
//! - [`loader`] turns a file, a directory or a URL into [`Document`]s
//! - [`TokenChunker`] splits documents into chunks bounded by a token budget
//!   measured with the embedding model's [`Tokenizer`]
//! - [`EmbeddingProvider`] implementations embed chunks and queries
//! - [`VectorStore`] implementations keep the embedded chunks
//! - [`VectorStoreManager`] builds a dataset once and reuses it afterwards
//! - [`VectorStoreRetriever`] answers queries, optionally re-ranking with
//!   maximal marginal relevance
//!
//! ## Features
//!
//! | feature  | enables |
//! |----------|---------|
//! | `openai` | [`OpenAIEmbeddingProvider`](openai::OpenAIEmbeddingProvider) |
//! | `qdrant` | [`QdrantVectorStore`](qdrant::QdrantVectorStore) |
//! | `local`  | fastembed models and Hugging Face tokenizers |
//! | `cuda`   | GPU execution for local embedding models |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ultima_rag::*;
//!
//! let manager = VectorStoreManager::builder()
//!     .config(IndexConfig::builder().mode(Mode::Local).build()?)
//!     .embedding_provider(embedder)
//!     .vector_store(Arc::new(LocalVectorStore::new("data")))
//!     .tokenizer(tokenizer)
//!     .build()?;
//!
//! let index = manager.get_vector_store("./docs").await?;
//! let retriever = manager.retriever(&index, SearchParams::default())?;
//! for hit in retriever.retrieve("What changed in March?").await? {
//!     println!("{:.3} {}", hit.score, hit.chunk.text);
//! }
//! ```

pub mod chunking;
pub mod config;
pub mod dataset;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod loader;
pub mod local;
pub mod manager;
pub mod retriever;
pub mod tokenizer;
pub mod vectorstore;

#[cfg(feature = "local")]
pub mod fastembed;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{Chunker, TokenChunker, split_documents};
pub use config::{IndexConfig, IndexConfigBuilder};
pub use dataset::{DatasetPath, Mode, clean_string_for_storing, get_dataset_path};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::{EmbeddingModel, EmbeddingProvider, HashEmbeddingProvider};
pub use error::{RagError, Result};
pub use inmemory::InMemoryVectorStore;
pub use loader::{SourceKind, classify, load_data_source, load_directory, load_document};
pub use local::LocalVectorStore;
pub use manager::{DatasetIndex, VectorStoreManager, VectorStoreManagerBuilder};
pub use retriever::{SearchParams, VectorStoreRetriever};
pub use tokenizer::{TiktokenTokenizer, Tokenizer, WhitespaceTokenizer};
pub use vectorstore::{DistanceMetric, VectorStore};

#[cfg(feature = "local")]
pub use tokenizer::HuggingFaceTokenizer;
