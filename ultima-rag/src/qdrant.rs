//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC. This is
//! the hosted index used in API mode: a dataset `hub://{org}/{name}` lives in
//! the collection `{org}__{name}` and the index token is sent as the API key.
//!
//! # Example
//!
//! ```rust,ignore
//! use ultima_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334", Some(token))?;
//! store.create_collection("acme__notes-txt-1536-128", 1536).await?;
//! store.upsert("acme__notes-txt-1536-128", &chunks).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId, PointStruct, PointsIdsList,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;
use uuid::Uuid;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{DistanceMetric, VectorStore};

/// Default gRPC endpoint of a Qdrant server.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Points per upsert request; keeps requests under the gRPC message limit.
const UPSERT_BATCH_SIZE: usize = 256;

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Collections use cosine distance. Searches with another [`DistanceMetric`]
/// take Qdrant's nearest candidates and re-score them locally.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Connect to the Qdrant server at `url`, authenticating with `api_key` if given.
    pub fn new(url: &str, api_key: Option<&str>) -> Result<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            builder = builder.api_key(key.to_string());
        }
        let client = builder.build().map_err(Self::map_err)?;
        Ok(Self { client })
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorStoreError { backend: "qdrant".to_string(), message: e.to_string() }
    }

    /// Qdrant only accepts UUIDs and integers as point ids, so chunk ids are
    /// mapped to name-based UUIDs and the original id is kept in the payload.
    fn point_id(chunk_id: &str) -> PointId {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string().into()
    }

    fn points(chunks: &[Chunk]) -> Result<Vec<PointStruct>> {
        chunks
            .iter()
            .map(|chunk| {
                Ok(PointStruct::new(
                    Self::point_id(&chunk.id),
                    chunk.embedding.clone(),
                    Self::payload(chunk)?,
                ))
            })
            .collect()
    }

    fn payload(chunk: &Chunk) -> Result<Payload> {
        let metadata: serde_json::Map<String, serde_json::Value> = chunk
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        let value = serde_json::json!({
            "chunk_id": chunk.id,
            "text": chunk.text,
            "document_id": chunk.document_id,
            "metadata": metadata,
        });
        Payload::try_from(value).map_err(Self::map_err)
    }

    fn as_text(value: &QdrantValue) -> Option<String> {
        if let Some(Kind::StringValue(text)) = &value.kind { Some(text.clone()) } else { None }
    }

    fn to_result(scored: ScoredPoint) -> SearchResult {
        let payload = &scored.payload;
        let field = |name: &str| payload.get(name).and_then(Self::as_text).unwrap_or_default();

        let metadata: HashMap<String, String> = payload
            .get("metadata")
            .and_then(|v| match &v.kind {
                Some(Kind::StructValue(s)) => Some(
                    s.fields
                        .iter()
                        .filter_map(|(k, v)| Self::as_text(v).map(|s| (k.clone(), s)))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default();

        let embedding = match scored.vectors.and_then(|v| v.vectors_options) {
            Some(VectorsOptions::Vector(vector)) => vector.data,
            _ => Vec::new(),
        };

        SearchResult {
            chunk: Chunk {
                id: field("chunk_id"),
                text: field("text"),
                embedding,
                metadata,
                document_id: field("document_id"),
            },
            score: scored.score,
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client.collection_exists(name).await.map_err(Self::map_err)
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        if self.collection_exists(name).await? {
            debug!(collection = name, "collection present");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = name, dimensions, "collection created");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.client.delete_collection(name).await.map_err(Self::map_err)?;
        debug!(collection = name, "collection dropped");
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            let points = Self::points(batch)?;
            self.client
                .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
                .await
                .map_err(Self::map_err)?;
            debug!(collection, points = batch.len(), "points written");
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let selector = PointsIdsList { ids: ids.iter().map(|id| Self::point_id(id)).collect() };
        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(selector).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection, points = ids.len(), "points removed");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, embedding.to_vec(), top_k as u64)
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(Self::map_err)?;

        let mut results: Vec<SearchResult> =
            response.result.into_iter().map(Self::to_result).collect();

        if metric != DistanceMetric::Cos {
            for result in &mut results {
                result.score = metric.score(embedding, &result.chunk.embedding);
            }
            results.sort_by(|a, b| b.score.total_cmp(&a.score));
        }

        Ok(results)
    }
}
