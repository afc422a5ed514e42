//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`TokenChunker`], which
//! splits text at the coarsest semantic boundary that fits (blank lines,
//! line breaks, sentences, words and finally characters) so that every
//! chunk fits a token budget measured by the embedding model's [`Tokenizer`].

use std::sync::Arc;

use text_splitter::{ChunkConfig, ChunkSizer, TextSplitter};
use tracing::{info, warn};

use crate::document::{CHUNK_INDEX_KEY, Chunk, Document};
use crate::error::{RagError, Result};
use crate::tokenizer::Tokenizer;

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the vector store manager.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    /// Each returned chunk has an empty embedding vector.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Measures candidate chunks with the embedding model's tokenizer.
struct TokenSizer(Arc<dyn Tokenizer>);

impl ChunkSizer for TokenSizer {
    fn size(&self, chunk: &str) -> usize {
        self.0.count(chunk)
    }
}

/// Splits text into chunks of at most `chunk_size` tokens, sharing up to
/// `chunk_overlap` tokens between neighbours.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use ultima_rag::{TiktokenTokenizer, TokenChunker};
///
/// let tokenizer = Arc::new(TiktokenTokenizer::for_model("text-embedding-ada-002")?);
/// let chunker = TokenChunker::new(512, 64, tokenizer)?;
/// let chunks = chunker.chunk(&document);
/// ```
pub struct TokenChunker {
    chunk_size: usize,
    tokenizer: Arc<dyn Tokenizer>,
    splitter: TextSplitter<TokenSizer>,
}

impl TokenChunker {
    /// Create a new `TokenChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        let config = ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| RagError::ConfigError(format!("invalid chunk config: {e}")))?
            .with_sizer(TokenSizer(tokenizer.clone()));
        Ok(Self { chunk_size, tokenizer, splitter: TextSplitter::new(config) })
    }

    /// Maximum number of tokens per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The tokenizer used to measure lengths.
    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// Split raw text into chunk strings.
    ///
    /// A single character that alone exceeds `chunk_size` is kept as its own
    /// chunk.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.splitter
            .chunks(text)
            .filter(|chunk| !chunk.trim().is_empty())
            .map(|chunk| {
                let tokens = self.tokenizer.count(chunk);
                if tokens > self.chunk_size {
                    warn!(tokens, chunk_size = self.chunk_size, "chunk exceeds chunk size");
                }
                chunk.to_string()
            })
            .collect()
    }
}

impl Chunker for TokenChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.trim().is_empty() {
            return Vec::new();
        }

        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let mut metadata = document.metadata.clone();
                metadata.insert(CHUNK_INDEX_KEY.to_string(), i.to_string());
                Chunk {
                    id: format!("{}_{i}", document.id),
                    text,
                    embedding: Vec::new(),
                    metadata,
                    document_id: document.id.clone(),
                }
            })
            .collect()
    }
}

/// Split every document, preserving each document's metadata on its chunks.
///
/// # Errors
///
/// Returns [`RagError::ChunkingError`] if documents with text produced no chunks at all.
pub fn split_documents(documents: &[Document], chunker: &dyn Chunker) -> Result<Vec<Chunk>> {
    let chunks: Vec<Chunk> = documents.iter().flat_map(|doc| chunker.chunk(doc)).collect();

    if chunks.is_empty() && documents.iter().any(|d| !d.text.trim().is_empty()) {
        return Err(RagError::ChunkingError("documents produced no chunks".into()));
    }

    info!(documents = documents.len(), chunks = chunks.len(), "split documents into chunks");
    Ok(chunks)
}
