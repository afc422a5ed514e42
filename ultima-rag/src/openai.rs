//! OpenAI embedding provider using the OpenAI embeddings API.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{EmbeddingModel, EmbeddingProvider};
use crate::error::{RagError, Result};

/// The default OpenAI API base URL.
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Maximum number of inputs sent in one embeddings request.
const MAX_BATCH_INPUTS: usize = 1000;

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// Uses `reqwest` to call the `/embeddings` endpoint directly. Large batches
/// are sent as several requests of at most 1000 inputs each.
///
/// # Example
///
/// ```rust,ignore
/// use ultima_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider for `text-embedding-ada-002` with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(failure("API key must not be empty"));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            api_base: OPENAI_API_BASE.into(),
            model: EmbeddingModel::Ada002.id().into(),
            dimensions: EmbeddingModel::Ada002.dimensions(),
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| failure("OPENAI_API_KEY is not set"))
            .and_then(Self::new)
    }

    /// Point the provider at an OpenAI-compatible server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Use another embeddings model with the given vector size.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.api_base);
        let body = EmbeddingsBody { model: &self.model, input: texts };
        let response =
            self.client.post(url).bearer_auth(&self.api_key).json(&body).send().await.map_err(
                |e| {
                    error!(error = %e, "embeddings request failed");
                    failure(format!("request failed: {e}"))
                },
            )?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ApiError>(&text) {
                Ok(parsed) => parsed.error.message,
                Err(_) => text,
            };
            error!(%status, "embeddings rejected");
            return Err(failure(format!("API returned {status}: {detail}")));
        }

        let mut parsed: EmbeddingsReply = response
            .json()
            .await
            .map_err(|e| failure(format!("unreadable embeddings reply: {e}")))?;
        if parsed.data.len() != texts.len() {
            return Err(failure(format!(
                "asked for {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

fn failure(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: "OpenAI".into(), message: message.into() }
}

#[derive(Serialize)]
struct EmbeddingsBody<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingsReply {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorMessage,
}

#[derive(Deserialize)]
struct ApiErrorMessage {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text]).await?.pop().ok_or_else(|| failure("no embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH_INPUTS) {
            debug!(model = %self.model, inputs = batch.len(), "embedding with OpenAI");
            vectors.extend(self.request(batch).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        assert!(OpenAIEmbeddingProvider::new("").is_err());
    }

    #[test]
    fn defaults_to_ada() {
        let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap();
        assert_eq!(provider.model, "text-embedding-ada-002");
        assert_eq!(provider.dimensions(), 1536);
    }

    #[test]
    fn api_base_is_normalized() {
        let provider = OpenAIEmbeddingProvider::new("sk-test")
            .unwrap()
            .with_api_base("http://localhost:8080/v1/");
        assert_eq!(provider.api_base, "http://localhost:8080/v1");
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap();
        assert!(provider.embed_batch(&[]).await.unwrap().is_empty());
    }
}
