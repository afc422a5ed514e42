//! Turns options and credentials into concrete model, embedding, tokenizer
//! and vector store instances.
//!
//! Every unsupported combination is a [`ChatError::Config`]: it is logged
//! and returned, never a panic.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};
use ultima_model::Llm;
use ultima_rag::{
    EmbeddingModel, EmbeddingProvider, LocalVectorStore, Mode, TiktokenTokenizer, Tokenizer,
    VectorStore,
};

use crate::credentials::Credentials;
use crate::error::{ChatError, Result};
use crate::models::ModelKind;
use crate::options::{Options, Settings};

fn unsupported(message: String) -> ChatError {
    error!("{message}");
    ChatError::Config(message)
}

#[cfg(feature = "openai")]
fn api_key(credentials: &Credentials) -> Result<&str> {
    credentials
        .openai_api_key
        .as_deref()
        .ok_or_else(|| unsupported("an OpenAI API key is required in api mode".into()))
}

/// The chat model selected by `options`.
pub async fn get_model(
    options: &Options,
    credentials: &Credentials,
    settings: &Settings,
) -> Result<Arc<dyn Llm>> {
    debug!(model = %options.model, "selecting model");
    match options.model {
        ModelKind::Gpt35Turbo | ModelKind::Gpt4 => openai_model(options, credentials),
        ModelKind::Gpt4All => local_model(options, settings).await,
    }
}

#[cfg(feature = "openai")]
fn openai_model(options: &Options, credentials: &Credentials) -> Result<Arc<dyn Llm>> {
    let client = ultima_model::OpenAIClient::new(api_key(credentials)?, options.model.name())?
        .with_temperature(options.temperature);
    Ok(Arc::new(client))
}

#[cfg(not(feature = "openai"))]
fn openai_model(options: &Options, _credentials: &Credentials) -> Result<Arc<dyn Llm>> {
    Err(unsupported(format!("Model {} not supported! Enable the `openai` feature", options.model)))
}

#[cfg(feature = "llama")]
async fn local_model(options: &Options, settings: &Settings) -> Result<Arc<dyn Llm>> {
    if options.model_n_ctx == 0 {
        return Err(unsupported("model_n_ctx must be greater than 0".into()));
    }
    let Some(path) = options.model.weights_path(&settings.models_dir) else {
        return Err(unsupported(format!("Model {} has no local weights", options.model)));
    };
    if !path.is_file() {
        return Err(unsupported(format!(
            "Model {} needs its weights at {}",
            options.model,
            path.display()
        )));
    }
    let model = ultima_model::LocalLlm::load(
        &path,
        options.model.name(),
        options.model_n_ctx,
        options.temperature,
    )
    .await?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "llama"))]
async fn local_model(options: &Options, _settings: &Settings) -> Result<Arc<dyn Llm>> {
    Err(unsupported(format!("Model {} not supported! Enable the `llama` feature", options.model)))
}

/// The embedding provider of the selected model, or of the embedding model
/// chosen in `options`.
pub fn get_embeddings(
    options: &Options,
    credentials: &Credentials,
    settings: &Settings,
) -> Result<Arc<dyn EmbeddingProvider>> {
    embeddings_for(options.embedding_model(), credentials, settings)
}

/// The embedding provider for `kind`.
pub fn embeddings_for(
    kind: EmbeddingModel,
    credentials: &Credentials,
    settings: &Settings,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match kind {
        EmbeddingModel::Ada002 => openai_embeddings(kind, credentials),
        EmbeddingModel::MiniLmL6V2 | EmbeddingModel::NomicEmbedV15 => {
            local_embeddings(kind, settings)
        }
    }
}

#[cfg(feature = "openai")]
fn openai_embeddings(
    _kind: EmbeddingModel,
    credentials: &Credentials,
) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = ultima_rag::openai::OpenAIEmbeddingProvider::new(api_key(credentials)?)?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "openai"))]
fn openai_embeddings(
    kind: EmbeddingModel,
    _credentials: &Credentials,
) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(unsupported(format!("Embeddings {kind} not supported! Enable the `openai` feature")))
}

#[cfg(feature = "local")]
fn local_embeddings(
    kind: EmbeddingModel,
    settings: &Settings,
) -> Result<Arc<dyn EmbeddingProvider>> {
    use ultima_rag::fastembed::{Device, FastEmbedProvider};

    // The small model stays on the CPU.
    let device = match kind {
        EmbeddingModel::NomicEmbedV15 => Device::detect(),
        _ => Device::Cpu,
    };
    let provider = FastEmbedProvider::new(kind, device, settings.models_dir.clone())?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "local"))]
fn local_embeddings(
    kind: EmbeddingModel,
    _settings: &Settings,
) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(unsupported(format!("Embeddings {kind} not supported! Enable the `local` feature")))
}

/// The tokenizer of the selected embedding model, used to measure chunks.
pub fn get_tokenizer(options: &Options) -> Result<Arc<dyn Tokenizer>> {
    tokenizer_for(options.embedding_model())
}

/// The tokenizer belonging to `kind`.
pub fn tokenizer_for(kind: EmbeddingModel) -> Result<Arc<dyn Tokenizer>> {
    match kind {
        EmbeddingModel::Ada002 => Ok(Arc::new(TiktokenTokenizer::for_model(kind.id())?)),
        EmbeddingModel::MiniLmL6V2 | EmbeddingModel::NomicEmbedV15 => local_tokenizer(kind),
    }
}

#[cfg(feature = "local")]
fn local_tokenizer(kind: EmbeddingModel) -> Result<Arc<dyn Tokenizer>> {
    Ok(Arc::new(ultima_rag::HuggingFaceTokenizer::from_pretrained(kind.id())?))
}

#[cfg(not(feature = "local"))]
fn local_tokenizer(kind: EmbeddingModel) -> Result<Arc<dyn Tokenizer>> {
    Err(unsupported(format!("Tokenizer {kind} not supported! Enable the `local` feature")))
}

/// The vector store datasets of `options.mode` are kept in.
pub fn get_vector_store(
    options: &Options,
    credentials: &Credentials,
    settings: &Settings,
) -> Result<Arc<dyn VectorStore>> {
    match options.mode {
        Mode::Local => Ok(Arc::new(LocalVectorStore::new(settings.data_dir.clone()))),
        Mode::Api => hosted_store(credentials),
    }
}

#[cfg(feature = "qdrant")]
fn hosted_store(credentials: &Credentials) -> Result<Arc<dyn VectorStore>> {
    let store = ultima_rag::qdrant::QdrantVectorStore::new(
        credentials.index_url(),
        credentials.index_token.as_deref(),
    )?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "qdrant"))]
fn hosted_store(_credentials: &Credentials) -> Result<Arc<dyn VectorStore>> {
    Err(unsupported("API mode datasets need the `qdrant` feature".into()))
}

/// The backends a session builds its chains from.
///
/// [`DefaultComponents`] is the production mapping; tests and offline runs
/// plug in their own.
#[async_trait]
pub trait Components: Send + Sync {
    fn settings(&self) -> &Settings;

    async fn model(&self, options: &Options, credentials: &Credentials) -> Result<Arc<dyn Llm>>;

    fn embeddings(
        &self,
        options: &Options,
        credentials: &Credentials,
    ) -> Result<Arc<dyn EmbeddingProvider>>;

    fn tokenizer(&self, options: &Options) -> Result<Arc<dyn Tokenizer>>;

    fn vector_store(
        &self,
        options: &Options,
        credentials: &Credentials,
    ) -> Result<Arc<dyn VectorStore>>;
}

/// Selects backends with [`get_model`], [`get_embeddings`], [`get_tokenizer`]
/// and [`get_vector_store`].
#[derive(Debug, Clone, Default)]
pub struct DefaultComponents {
    settings: Settings,
}

impl DefaultComponents {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Components for DefaultComponents {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn model(&self, options: &Options, credentials: &Credentials) -> Result<Arc<dyn Llm>> {
        get_model(options, credentials, &self.settings).await
    }

    fn embeddings(
        &self,
        options: &Options,
        credentials: &Credentials,
    ) -> Result<Arc<dyn EmbeddingProvider>> {
        get_embeddings(options, credentials, &self.settings)
    }

    fn tokenizer(&self, options: &Options) -> Result<Arc<dyn Tokenizer>> {
        get_tokenizer(options)
    }

    fn vector_store(
        &self,
        options: &Options,
        credentials: &Credentials,
    ) -> Result<Arc<dyn VectorStore>> {
        get_vector_store(options, credentials, &self.settings)
    }
}
