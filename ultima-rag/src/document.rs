//! Data types for documents, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata key holding the file path or URL a document was loaded from.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the 1-based page number of a paged document.
pub const PAGE_KEY: &str = "page";
/// Metadata key holding the 0-based row of a CSV record.
pub const ROW_KEY: &str = "row";
/// Metadata key holding the position of a chunk within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document loaded from `source`, recording it in the metadata.
    pub fn from_source(id: impl Into<String>, text: impl Into<String>, source: &str) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: HashMap::from([(SOURCE_KEY.to_string(), source.to_string())]),
            source_uri: Some(source.to_string()),
        }
    }

    /// Attach an extra metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` metadata entry, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A segment of a [`Document`] with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text.
    pub embedding: Vec<f32>,
    /// Key-value metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The relevance score (higher is more relevant).
    pub score: f32,
}
