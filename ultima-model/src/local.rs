//! Local GGUF model inference through `llama.cpp`.
//!
//! Available with the `llama` feature; `cuda` offloads layers to the GPU.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use llama_cpp_2::{
    context::params::LlamaContextParams,
    llama_backend::LlamaBackend,
    llama_batch::LlamaBatch,
    model::{AddBos, LlamaModel, Special, params::LlamaModelParams},
    sampling::LlamaSampler,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{ModelError, Result};
use crate::llm::{ChatMessage, Llm, LlmRequest, LlmResponse, Role, Usage};

/// `llama.cpp` may only be initialised once per process.
static BACKEND: Mutex<Option<Arc<LlamaBackend>>> = Mutex::new(None);

fn backend() -> Result<Arc<LlamaBackend>> {
    let mut slot = BACKEND
        .lock()
        .map_err(|_| ModelError::Inference("llama backend lock poisoned".into()))?;
    if let Some(backend) = slot.as_ref() {
        return Ok(Arc::clone(backend));
    }
    let backend = Arc::new(
        LlamaBackend::init()
            .map_err(|e| ModelError::Inference(format!("Failed to initialize backend: {e:?}")))?,
    );
    *slot = Some(Arc::clone(&backend));
    Ok(backend)
}

struct Loaded {
    backend: Arc<LlamaBackend>,
    model: LlamaModel,
}

/// A chat model running on local GGUF weights.
///
/// The context window is fixed at load time (`n_ctx`). Generation stops at
/// the end-of-sequence token, at `max_tokens` or when the window is full.
///
/// # Example
///
/// ```rust,ignore
/// let model = LocalLlm::load("models/gpt4all-j-v1.3-groovy.gguf", "GPT4All", 1000, 0.25).await?;
/// ```
pub struct LocalLlm {
    name: String,
    path: PathBuf,
    n_ctx: u32,
    temperature: f32,
    inner: Arc<Loaded>,
}

impl std::fmt::Debug for LocalLlm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalLlm")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("n_ctx", &self.n_ctx)
            .finish()
    }
}

impl LocalLlm {
    /// Load the weights at `path`.
    ///
    /// Returns [`ModelError::ModelNotFound`] when the file does not exist.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn load(
        path: impl AsRef<Path>,
        name: impl Into<String>,
        n_ctx: u32,
        temperature: f32,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if n_ctx == 0 {
            return Err(ModelError::Config("model_n_ctx must be greater than 0".into()));
        }
        if !path.is_file() {
            return Err(ModelError::ModelNotFound { path: path.display().to_string() });
        }

        info!("Loading local model");
        let load_path = path.clone();
        let inner = tokio::task::spawn_blocking(move || -> Result<Loaded> {
            let backend = backend()?;
            let params = LlamaModelParams::default();
            #[cfg(feature = "cuda")]
            let params = params.with_n_gpu_layers(u32::MAX);
            let model = LlamaModel::load_from_file(&backend, &load_path, &params)
                .map_err(|e| ModelError::Inference(format!("Failed to load model: {e:?}")))?;
            Ok(Loaded { backend, model })
        })
        .await
        .map_err(|e| ModelError::Inference(e.to_string()))??;

        Ok(Self { name: name.into(), path, n_ctx, temperature, inner: Arc::new(inner) })
    }

    /// The weights file this model was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Plain instruction-style transcript, closed by an open assistant turn.
fn render_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let header = match message.role {
            Role::System => "### System:",
            Role::User => "### User:",
            Role::Assistant => "### Assistant:",
        };
        prompt.push_str(header);
        prompt.push('\n');
        prompt.push_str(message.content.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str("### Assistant:\n");
    prompt
}

/// Seed value that makes llama.cpp pick a fresh random seed.
const RANDOM_SEED: u32 = u32::MAX;

/// Zero temperature decodes greedily.
fn is_greedy(temperature: f32) -> bool {
    temperature <= 0.0
}

/// Temperature-scaled sampling from the token distribution.
fn sampler(temperature: f32) -> LlamaSampler {
    if is_greedy(temperature) {
        return LlamaSampler::greedy();
    }
    LlamaSampler::chain_simple([LlamaSampler::temp(temperature), LlamaSampler::dist(RANDOM_SEED)])
}

fn generate_blocking(
    loaded: &Loaded,
    prompt: &str,
    n_ctx: u32,
    temperature: f32,
    max_tokens: Option<u32>,
) -> Result<LlmResponse> {
    let inference =
        |what: &str, e: &dyn std::fmt::Debug| ModelError::Inference(format!("{what}: {e:?}"));
    let model = &loaded.model;

    let tokens = model
        .str_to_token(prompt, AddBos::Always)
        .map_err(|e| inference("Failed to tokenize prompt", &e))?;
    let window = n_ctx as usize;
    if tokens.is_empty() || tokens.len() >= window {
        return Err(ModelError::Inference(format!(
            "prompt of {} tokens does not fit the context window of {window}",
            tokens.len()
        )));
    }

    let params = LlamaContextParams::default().with_n_ctx(NonZeroU32::new(n_ctx));
    let mut context = model
        .new_context(&loaded.backend, params)
        .map_err(|e| inference("Failed to create context", &e))?;

    let mut batch = LlamaBatch::new(window, 1);
    let last = tokens.len() - 1;
    for (i, &token) in tokens.iter().enumerate() {
        batch
            .add(token, i as i32, &[0], i == last)
            .map_err(|e| inference("Failed to add token", &e))?;
    }
    context.decode(&mut batch).map_err(|e| inference("Decode failed", &e))?;

    let limit = max_tokens.map_or(window, |m| (tokens.len() + m as usize).min(window));
    let mut sampler = sampler(temperature);
    let eos = model.token_eos();
    let mut output = String::new();
    let mut position = tokens.len();

    while position < limit {
        let token = sampler.sample(&context, -1);
        if token == eos {
            break;
        }
        match model.token_to_str(token, Special::Plaintext) {
            Ok(piece) => output.push_str(&piece),
            Err(e) => warn!(error = ?e, "Skipping token that is not valid UTF-8"),
        }

        batch.clear();
        batch
            .add(token, position as i32, &[0], true)
            .map_err(|e| inference("Failed to add token", &e))?;
        context.decode(&mut batch).map_err(|e| inference("Decode failed", &e))?;
        position += 1;
    }

    let completion = (position - tokens.len()) as u64;
    Ok(LlmResponse {
        text: output.trim().to_string(),
        usage: Usage::new(tokens.len() as u64, completion),
    })
}

#[async_trait]
impl Llm for LocalLlm {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, request), fields(model = %self.name))]
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let prompt = render_prompt(&request.messages);
        let loaded = Arc::clone(&self.inner);
        let n_ctx = self.n_ctx;
        let temperature = request.temperature.unwrap_or(self.temperature);
        let max_tokens = request.max_tokens;

        let response = tokio::task::spawn_blocking(move || {
            generate_blocking(&loaded, &prompt, n_ctx, temperature, max_tokens)
        })
        .await
        .map_err(|e| ModelError::Inference(e.to_string()))??;

        debug!(completion_tokens = response.usage.completion_tokens, "Local completion finished");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_zero_temperature_is_greedy() {
        assert!(is_greedy(0.0));
        assert!(!is_greedy(0.25));
        assert!(!is_greedy(1.5));
        // Both sampler shapes can be built.
        let _ = sampler(0.0);
        let _ = sampler(0.25);
    }

    #[tokio::test]
    async fn missing_weights_are_reported() {
        let err = LocalLlm::load("/nonexistent/weights.gguf", "GPT4All", 1000, 0.25)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::ModelNotFound { .. }));
    }

    #[tokio::test]
    async fn zero_context_is_rejected() {
        let err =
            LocalLlm::load("/nonexistent/weights.gguf", "GPT4All", 0, 0.25).await.unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }

    #[test]
    fn prompt_ends_with_open_assistant_turn() {
        let prompt = render_prompt(&[ChatMessage::system("Be brief."), ChatMessage::user(" Hi ")]);
        assert_eq!(prompt, "### System:\nBe brief.\n\n### User:\nHi\n\n### Assistant:\n");
    }
}
