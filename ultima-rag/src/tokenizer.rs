//! Tokenizers used to measure chunk and prompt lengths.
//!
//! Lengths are always measured with the tokenizer that belongs to the
//! embedding model, so a `chunk_size` of 512 means 512 tokens *of that model*.

use tiktoken_rs::CoreBPE;

use crate::error::{RagError, Result};

/// Encodes text into model tokens.
pub trait Tokenizer: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Encode `text` into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// Byte-pair encoding used by the OpenAI models.
///
/// Special-token markers inside documents are encoded as ordinary text,
/// so a document containing `<|endoftext|>` never fails to tokenize.
pub struct TiktokenTokenizer {
    name: String,
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// Load the encoding used by `model` (e.g. `text-embedding-ada-002`).
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| RagError::TokenizerError {
            tokenizer: model.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { name: model.to_string(), bpe })
    }

    /// The `cl100k_base` encoding.
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| RagError::TokenizerError {
            tokenizer: "cl100k_base".into(),
            message: e.to_string(),
        })?;
        Ok(Self { name: "cl100k_base".into(), bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text).into_iter().map(|t| t as u32).collect()
    }
}

/// A Hugging Face `tokenizers` tokenizer fetched from the hub.
///
/// This type is only available when the `local` feature is enabled.
#[cfg(feature = "local")]
pub struct HuggingFaceTokenizer {
    name: String,
    inner: tokenizers::Tokenizer,
}

#[cfg(feature = "local")]
impl HuggingFaceTokenizer {
    /// Download (or read from the local cache) the tokenizer of `model_id`.
    pub fn from_pretrained(model_id: &str) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_pretrained(model_id, None).map_err(|e| {
            RagError::TokenizerError { tokenizer: model_id.to_string(), message: e.to_string() }
        })?;
        Ok(Self { name: model_id.to_string(), inner })
    }
}

#[cfg(feature = "local")]
impl Tokenizer for HuggingFaceTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        match self.inner.encode(text, false) {
            Ok(encoding) => encoding.get_ids().to_vec(),
            Err(e) => {
                // Fall back to a pessimistic estimate so oversize chunks are still split.
                tracing::warn!(tokenizer = %self.name, error = %e, "encoding failed, estimating");
                vec![0; text.len()]
            }
        }
    }
}

/// Counts whitespace-separated words as tokens.
///
/// Needs no model files; used for offline runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn name(&self) -> &str {
        "whitespace"
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        text.split_whitespace().map(|word| word.len() as u32).collect()
    }
}
