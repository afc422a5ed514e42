//! # ultima-chat
//!
//! Conversational retrieval over your own documents.
//!
//! A [`SessionState`] holds the options, the credentials, the current
//! [`RetrievalChain`] and the chat history. The [`selector`] maps options to
//! concrete backends through the [`Components`] trait, and [`get_chain`]
//! wires a dataset, a retriever and a model together.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ultima_chat::*;
//!
//! let components = DefaultComponents::new(Settings::default());
//! let state = SessionState::new(Options::default());
//! let (state, _) = state.authenticate(Credentials::default(), &LiveVerifier).await;
//! let (state, _) = state.set_data_source("./docs", &components).await;
//! let (state, notice) = state.update_chain(&components).await;
//! println!("{notice}");
//! let (state, answer) = state.generate_response("What is this project about?").await;
//! ```

pub mod chain;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod models;
pub mod options;
pub mod selector;
pub mod session;

pub use chain::{ChainResponse, Exchange, RetrievalChain, get_chain};
pub use credentials::{CredentialVerifier, Credentials, LiveVerifier};
pub use error::{ChatError, Result};
pub use models::ModelKind;
pub use options::{Options, PROJECT_URL, Settings};
pub use selector::{Components, DefaultComponents, get_embeddings, get_model, get_tokenizer};
pub use session::{Notice, NoticeLevel, SessionState, UsageTotals};
pub use ultima_rag::{DistanceMetric, EmbeddingModel, Mode};
