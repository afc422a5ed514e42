//! Session options and process-wide settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use ultima_rag::config::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use ultima_rag::{DistanceMetric, EmbeddingModel, IndexConfig, Mode, SearchParams};

use crate::error::{ChatError, Result};
use crate::models::ModelKind;

/// Where to ask for support of new data sources.
pub const PROJECT_URL: &str = ultima_rag::loader::PROJECT_URL;

pub const DEFAULT_K: usize = 26;
pub const DEFAULT_FETCH_K: usize = 26;
pub const DEFAULT_TEMPERATURE: f32 = 0.25;
pub const DEFAULT_MAX_TOKENS: usize = 8192;
pub const DEFAULT_MODEL_N_CTX: u32 = 1000;

/// Everything that shapes how a chain is built.
///
/// Changing any field invalidates the current chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub mode: Mode,
    pub model: ModelKind,
    /// Embedding model replacing the one paired with `model`.
    pub embedding: Option<EmbeddingModel>,
    /// Chunks handed to the model per question.
    pub k: usize,
    /// Candidates scanned before diversity re-ranking.
    pub fetch_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub temperature: f32,
    /// Hard cap on the tokens of retrieved context in one prompt.
    pub max_tokens: usize,
    /// Context window of local models.
    pub model_n_ctx: u32,
    pub distance_metric: DistanceMetric,
    pub maximal_marginal_relevance: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            mode: Mode::Api,
            model: ModelKind::Gpt4,
            embedding: None,
            k: DEFAULT_K,
            fetch_k: DEFAULT_FETCH_K,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            model_n_ctx: DEFAULT_MODEL_N_CTX,
            distance_metric: DistanceMetric::Cos,
            maximal_marginal_relevance: true,
        }
    }
}

impl Options {
    /// Check the invariants between fields.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChatError::Config("chunk_size must be greater than 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChatError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.k == 0 {
            return Err(ChatError::Config("k must be greater than 0".into()));
        }
        if self.fetch_k < self.k {
            return Err(ChatError::Config(format!(
                "fetch_k ({}) must be at least k ({})",
                self.fetch_k, self.k
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ChatError::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ChatError::Config("max_tokens must be greater than 0".into()));
        }
        if self.model.mode() != self.mode {
            return Err(ChatError::Config(format!(
                "model {} is not available in {} mode",
                self.model, self.mode
            )));
        }
        if self.mode == Mode::Local && !self.embedding_model().is_local() {
            return Err(ChatError::Config(format!(
                "embeddings {} are not available in {} mode",
                self.embedding_model(),
                self.mode
            )));
        }
        Ok(())
    }

    /// Token cap on the retrieved context of one prompt.
    ///
    /// Local models also have to fit the prompt template, the question and
    /// the answer into `model_n_ctx`, so their context gets at most half of it.
    pub fn context_budget(&self) -> usize {
        match self.mode {
            Mode::Api => self.max_tokens,
            Mode::Local => self.max_tokens.min(self.model_n_ctx as usize / 2),
        }
    }

    /// The embedding model datasets are built and queried with.
    pub fn embedding_model(&self) -> EmbeddingModel {
        self.embedding.unwrap_or_else(|| self.model.embedding())
    }

    /// Set one option from its textual form, as typed by a user.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |e: &dyn std::fmt::Display| {
            ChatError::Config(format!("invalid value for {key}: {e}"))
        };
        match key {
            "mode" => self.mode = value.parse().map_err(|e| invalid(&e))?,
            "model" => self.model = value.parse()?,
            "embedding" => {
                self.embedding = match value.trim() {
                    "" | "default" => None,
                    name => Some(name.parse().map_err(|e| invalid(&e))?),
                }
            }
            "k" => self.k = value.parse().map_err(|e| invalid(&e))?,
            "fetch_k" => self.fetch_k = value.parse().map_err(|e| invalid(&e))?,
            "chunk_size" => self.chunk_size = value.parse().map_err(|e| invalid(&e))?,
            "chunk_overlap" => self.chunk_overlap = value.parse().map_err(|e| invalid(&e))?,
            "temperature" => self.temperature = value.parse().map_err(|e| invalid(&e))?,
            "max_tokens" => self.max_tokens = value.parse().map_err(|e| invalid(&e))?,
            "model_n_ctx" => self.model_n_ctx = value.parse().map_err(|e| invalid(&e))?,
            "distance_metric" => self.distance_metric = value.parse().map_err(|e| invalid(&e))?,
            "maximal_marginal_relevance" => {
                self.maximal_marginal_relevance = value.parse().map_err(|e| invalid(&e))?
            }
            _ => return Err(ChatError::Config(format!("unknown option '{key}'"))),
        }
        Ok(())
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            k: self.k,
            fetch_k: self.fetch_k,
            maximal_marginal_relevance: self.maximal_marginal_relevance,
            distance_metric: self.distance_metric,
        }
    }

    /// Index configuration for datasets built with these options.
    pub fn index_config(&self, org: &str, settings: &Settings) -> Result<IndexConfig> {
        Ok(IndexConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .mode(self.mode)
            .org(org)
            .data_dir(settings.data_dir.clone())
            .build()?)
    }
}

/// Where datasets and model files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub models_dir: PathBuf,
    pub project_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            models_dir: PathBuf::from("models"),
            project_url: PROJECT_URL.to_string(),
        }
    }
}

impl Settings {
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = Options::default();
        options.validate().unwrap();
        assert_eq!((options.k, options.fetch_k), (26, 26));
        assert_eq!((options.chunk_size, options.chunk_overlap), (1536, 128));
        assert_eq!(options.model, ModelKind::Gpt4);
        assert_eq!(options.distance_metric, DistanceMetric::Cos);
    }

    #[test]
    fn rejects_broken_combinations() {
        let bad = [
            Options { chunk_overlap: 1536, ..Options::default() },
            Options { k: 0, ..Options::default() },
            Options { fetch_k: 10, k: 20, ..Options::default() },
            Options { temperature: 2.5, ..Options::default() },
            Options { mode: Mode::Local, ..Options::default() },
        ];
        for options in bad {
            assert!(matches!(options.validate(), Err(ChatError::Config(_))), "{options:?}");
        }
    }

    #[test]
    fn set_parses_values() {
        let mut options = Options::default();
        options.set("k", "4").unwrap();
        options.set("distance_metric", "L2").unwrap();
        options.set("maximal_marginal_relevance", "false").unwrap();
        options.set("model", "gpt-3.5-turbo").unwrap();
        assert_eq!(options.k, 4);
        assert_eq!(options.distance_metric, DistanceMetric::L2);
        assert!(!options.maximal_marginal_relevance);
        assert_eq!(options.model, ModelKind::Gpt35Turbo);

        assert!(options.set("k", "many").is_err());
        assert!(options.set("colour", "blue").is_err());
    }

    #[test]
    fn local_context_budget_fits_the_model_window() {
        assert_eq!(Options::default().context_budget(), DEFAULT_MAX_TOKENS);

        let local = Options { mode: Mode::Local, model: ModelKind::Gpt4All, ..Options::default() };
        assert_eq!(local.context_budget(), 500);
        let small = Options { max_tokens: 200, ..local.clone() };
        assert_eq!(small.context_budget(), 200);
        let wide = Options { model_n_ctx: 4096, ..local };
        assert_eq!(wide.context_budget(), 2048);
    }

    #[test]
    fn every_embedding_model_can_be_selected() {
        assert_eq!(Options::default().embedding_model(), EmbeddingModel::Ada002);
        for kind in EmbeddingModel::ALL {
            let mut options = Options::default();
            options.set("embedding", kind.id()).unwrap();
            options.validate().unwrap();
            assert_eq!(options.embedding_model(), kind);
        }

        let mut local =
            Options { mode: Mode::Local, model: ModelKind::Gpt4All, ..Options::default() };
        assert_eq!(local.embedding_model(), EmbeddingModel::MiniLmL6V2);
        local.set("embedding", "nomic-embed-text-v1.5").unwrap();
        local.validate().unwrap();
        assert_eq!(local.embedding_model(), EmbeddingModel::NomicEmbedV15);

        local.set("embedding", "text-embedding-ada-002").unwrap();
        assert!(matches!(local.validate(), Err(ChatError::Config(_))));
        local.set("embedding", "default").unwrap();
        assert_eq!(local.embedding, None);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let options: Options = serde_json::from_str(r#"{"k": 3, "fetch_k": 9}"#).unwrap();
        assert_eq!(options.k, 3);
        assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
