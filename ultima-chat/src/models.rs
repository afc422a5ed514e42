//! The catalog of chat models and their fixed attributes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ultima_rag::{EmbeddingModel, Mode};

use crate::error::ChatError;

/// File name of the local model weights inside the models directory.
pub const GPT4ALL_WEIGHTS: &str = "gpt4all-j-v1.3-groovy.gguf";

/// A supported chat model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelKind {
    Gpt35Turbo,
    Gpt4,
    Gpt4All,
}

impl ModelKind {
    /// All models in catalog order.
    pub const ALL: [ModelKind; 3] = [ModelKind::Gpt35Turbo, ModelKind::Gpt4, ModelKind::Gpt4All];

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Gpt35Turbo => "gpt-3.5-turbo",
            ModelKind::Gpt4 => "gpt-4",
            ModelKind::Gpt4All => "GPT4All",
        }
    }

    pub fn mode(self) -> Mode {
        match self {
            ModelKind::Gpt35Turbo | ModelKind::Gpt4 => Mode::Api,
            ModelKind::Gpt4All => Mode::Local,
        }
    }

    /// The embedding model datasets for this chat model are built with.
    pub fn embedding(self) -> EmbeddingModel {
        match self {
            ModelKind::Gpt35Turbo | ModelKind::Gpt4 => EmbeddingModel::Ada002,
            ModelKind::Gpt4All => EmbeddingModel::MiniLmL6V2,
        }
    }

    /// Location of the weights for local models.
    pub fn weights_path(self, models_dir: &Path) -> Option<PathBuf> {
        match self {
            ModelKind::Gpt35Turbo | ModelKind::Gpt4 => None,
            ModelKind::Gpt4All => Some(models_dir.join(GPT4ALL_WEIGHTS)),
        }
    }

    /// The models of `mode`, in catalog order.
    pub fn for_mode(mode: Mode) -> Vec<ModelKind> {
        Self::ALL.into_iter().filter(|m| m.mode() == mode).collect()
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChatError::Config(format!("Model {s} not supported!")))
    }
}

impl TryFrom<String> for ModelKind {
    type Error = ChatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelKind> for String {
    fn from(model: ModelKind) -> Self {
        model.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_mode_keeps_catalog_order() {
        assert_eq!(ModelKind::for_mode(Mode::Api), vec![ModelKind::Gpt35Turbo, ModelKind::Gpt4]);
        assert_eq!(ModelKind::for_mode(Mode::Local), vec![ModelKind::Gpt4All]);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("gpt4all".parse::<ModelKind>().unwrap(), ModelKind::Gpt4All);
        assert_eq!("GPT-4".parse::<ModelKind>().unwrap(), ModelKind::Gpt4);
        assert!(matches!("llama-70b".parse::<ModelKind>(), Err(ChatError::Config(_))));
    }

    #[test]
    fn only_local_models_have_weights() {
        let dir = Path::new("models");
        assert_eq!(
            ModelKind::Gpt4All.weights_path(dir),
            Some(dir.join("gpt4all-j-v1.3-groovy.gguf"))
        );
        assert_eq!(ModelKind::Gpt4.weights_path(dir), None);
    }

    #[test]
    fn serializes_as_name() {
        assert_eq!(serde_json::to_string(&ModelKind::Gpt35Turbo).unwrap(), r#""gpt-3.5-turbo""#);
        let parsed: ModelKind = serde_json::from_str(r#""GPT4All""#).unwrap();
        assert_eq!(parsed, ModelKind::Gpt4All);
    }
}
