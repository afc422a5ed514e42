//! # ultima-model
//!
//! Chat models for Ultima behind one [`Llm`] trait.
//!
//! ## Features
//!
//! | feature  | enables |
//! |----------|---------|
//! | `openai` | [`OpenAIClient`](openai::OpenAIClient), `gpt-3.5-turbo` / `gpt-4` |
//! | `llama`  | [`LocalLlm`](local::LocalLlm), GGUF weights through `llama.cpp` |
//! | `cuda`   | GPU offload for local models |
//!
//! [`MockLlm`] and [`Pricing`] are always available.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ultima_model::{ChatMessage, Llm, LlmRequest, Pricing};
//!
//! let response = model.generate(LlmRequest::new(vec![ChatMessage::user("Hello")])).await?;
//! let cost = Pricing::for_model(model.name()).cost(&response.usage);
//! ```

pub mod error;
pub mod llm;
pub mod mock;
pub mod pricing;

#[cfg(feature = "llama")]
pub mod local;
#[cfg(feature = "openai")]
pub mod openai;

pub use error::{ModelError, Result};
pub use llm::{ChatMessage, Llm, LlmRequest, LlmResponse, Role, Usage};
pub use mock::MockLlm;
pub use pricing::Pricing;

#[cfg(feature = "llama")]
pub use local::LocalLlm;
#[cfg(feature = "openai")]
pub use openai::OpenAIClient;
