//! Configuration for building and locating datasets.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dataset::Mode;
use crate::error::{RagError, Result};

/// Default number of tokens per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1536;
/// Default number of tokens shared by neighbouring chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 128;

/// Parameters that decide how a data source is split and where its dataset lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    /// Maximum chunk size in tokens of the embedding model.
    pub chunk_size: usize,
    /// Number of tokens shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// API mode keeps datasets on the index service, local mode under `data_dir`.
    pub mode: Mode,
    /// Organization owning datasets on the index service.
    pub org: String,
    /// Parent directory of local datasets.
    pub data_dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            mode: Mode::Api,
            org: String::new(),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl IndexConfig {
    /// Create a new builder for constructing an [`IndexConfig`].
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`IndexConfig`].
#[derive(Debug, Clone, Default)]
pub struct IndexConfigBuilder {
    config: IndexConfig,
}

impl IndexConfigBuilder {
    /// Set the maximum chunk size in tokens.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in tokens.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set where datasets are kept.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the organization owning hosted datasets.
    pub fn org(mut self, org: impl Into<String>) -> Self {
        self.config.org = org.into();
        self
    }

    /// Set the parent directory of local datasets.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Build the [`IndexConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `mode` is API and no organization is set
    pub fn build(self) -> Result<IndexConfig> {
        if self.config.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.config.chunk_overlap, self.config.chunk_size
            )));
        }
        if self.config.mode == Mode::Api && self.config.org.trim().is_empty() {
            return Err(RagError::ConfigError(
                "an index organization is required in api mode".to_string(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_need_an_org_in_api_mode() {
        assert!(IndexConfig::builder().build().is_err());
        let config = IndexConfig::builder().org("acme").build().unwrap();
        assert_eq!(config.chunk_size, 1536);
        assert_eq!(config.chunk_overlap, 128);
    }

    #[test]
    fn local_mode_needs_no_org() {
        assert!(IndexConfig::builder().mode(Mode::Local).build().is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = IndexConfig::builder().org("acme").chunk_size(64).chunk_overlap(64).build();
        assert!(matches!(err, Err(RagError::ConfigError(_))));
    }
}
