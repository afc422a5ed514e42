//! On-disk vector store.
//!
//! [`LocalVectorStore`] keeps every collection in a directory under a root
//! path, with the chunks serialized to `index.json`. Collections are read
//! once on first use and rewritten after every change. Search is an exact
//! scan, which is fine for the document sets a single user indexes locally.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{DistanceMetric, VectorStore, rank};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredCollection {
    dimensions: usize,
    chunks: HashMap<String, Chunk>,
}

/// A [`VectorStore`] persisted as JSON files on the local filesystem.
///
/// # Example
///
/// ```rust,ignore
/// use ultima_rag::{LocalVectorStore, VectorStore};
///
/// let store = LocalVectorStore::new("./data");
/// if !store.collection_exists("notes-txt-1536-128").await? {
///     store.create_collection("notes-txt-1536-128", 384).await?;
/// }
/// ```
#[derive(Debug)]
pub struct LocalVectorStore {
    root: PathBuf,
    cache: RwLock<HashMap<String, StoredCollection>>,
}

impl LocalVectorStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), cache: RwLock::new(HashMap::new()) }
    }

    /// The directory holding all collections.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(INDEX_FILE)
    }

    fn map_err(name: &str, e: impl std::fmt::Display) -> RagError {
        RagError::VectorStoreError {
            backend: "local".to_string(),
            message: format!("collection '{name}': {e}"),
        }
    }

    /// Make sure `name` is in the cache, reading it from disk if needed.
    async fn ensure_loaded(&self, name: &str) -> Result<()> {
        if self.cache.read().await.contains_key(name) {
            return Ok(());
        }

        let path = self.index_path(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Self::map_err(name, "does not exist"));
            }
            Err(e) => return Err(e.into()),
        };
        let stored: StoredCollection =
            serde_json::from_slice(&bytes).map_err(|e| Self::map_err(name, e))?;

        debug!(collection = name, chunks = stored.chunks.len(), "loaded local collection");
        self.cache.write().await.entry(name.to_string()).or_insert(stored);
        Ok(())
    }

    async fn persist(&self, name: &str, stored: &StoredCollection) -> Result<()> {
        let path = self.index_path(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(stored).map_err(|e| Self::map_err(name, e))?;
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        if self.cache.read().await.contains_key(name) {
            return Ok(true);
        }
        Ok(tokio::fs::try_exists(self.index_path(name)).await?)
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        if self.collection_exists(name).await? {
            debug!(collection = name, "local collection already exists, skipping creation");
            return Ok(());
        }

        let stored = StoredCollection { dimensions, chunks: HashMap::new() };
        self.persist(name, &stored).await?;
        self.cache.write().await.insert(name.to_string(), stored);
        debug!(collection = name, dimensions, "created local collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.cache.write().await.remove(name);
        match tokio::fs::remove_dir_all(self.root.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        self.ensure_loaded(collection).await?;
        let mut cache = self.cache.write().await;
        let stored =
            cache.get_mut(collection).ok_or_else(|| Self::map_err(collection, "not loaded"))?;

        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != stored.dimensions) {
            return Err(Self::map_err(
                collection,
                format!(
                    "chunk '{}' has {} dimensions, expected {}",
                    bad.id,
                    bad.embedding.len(),
                    stored.dimensions
                ),
            ));
        }
        for chunk in chunks {
            stored.chunks.insert(chunk.id.clone(), chunk.clone());
        }

        self.persist(collection, stored).await?;
        debug!(collection, count = chunks.len(), "upserted chunks to local store");
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        self.ensure_loaded(collection).await?;
        let mut cache = self.cache.write().await;
        let stored =
            cache.get_mut(collection).ok_or_else(|| Self::map_err(collection, "not loaded"))?;
        for id in ids {
            stored.chunks.remove(*id);
        }
        self.persist(collection, stored).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<SearchResult>> {
        self.ensure_loaded(collection).await?;
        let cache = self.cache.read().await;
        let stored = cache.get(collection).ok_or_else(|| Self::map_err(collection, "not loaded"))?;
        Ok(rank(stored.chunks.values().cloned(), embedding, top_k, metric))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: format!("text of {id}"),
            embedding,
            metadata: HashMap::new(),
            document_id: "doc".to_string(),
        }
    }

    #[tokio::test]
    async fn collections_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();

        let store = LocalVectorStore::new(dir.path());
        assert!(!store.collection_exists("notes").await.unwrap());
        store.create_collection("notes", 2).await.unwrap();
        store
            .upsert("notes", &[chunk("a", vec![1.0, 0.0]), chunk("b", vec![0.0, 1.0])])
            .await
            .unwrap();

        let reopened = LocalVectorStore::new(dir.path());
        assert!(reopened.collection_exists("notes").await.unwrap());
        let results = reopened.search("notes", &[0.9, 0.1], 1, DistanceMetric::Cos).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "a");
        assert_eq!(results[0].chunk.embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn rejects_wrong_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new(dir.path());
        store.create_collection("notes", 3).await.unwrap();
        let err = store.upsert("notes", &[chunk("a", vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, RagError::VectorStoreError { .. }));
    }

    #[tokio::test]
    async fn delete_collection_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new(dir.path());
        store.create_collection("notes", 2).await.unwrap();
        store.delete_collection("notes").await.unwrap();
        assert!(!store.collection_exists("notes").await.unwrap());
        assert!(!dir.path().join("notes").exists());
    }

    #[tokio::test]
    async fn searching_a_missing_collection_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new(dir.path());
        assert!(store.search("nope", &[1.0], 3, DistanceMetric::L2).await.is_err());
    }
}
