//! Session state and its transitions.
//!
//! A [`SessionState`] is owned by one conversation. Every transition takes the
//! state by value and hands back the next state together with a [`Notice`]
//! for the user, so a session can only run one action at a time.
//!
//! ```rust,ignore
//! let state = SessionState::new(Options::default());
//! let (state, notice) = state.authenticate(Credentials::default(), &LiveVerifier).await;
//! let (state, notice) = state.set_data_source("notes.txt", &components).await;
//! let (state, notice) = state.update_chain(&components).await;
//! let (state, answer) = state.generate_response("What is in my notes?").await;
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use ultima_model::{Pricing, Usage};
use ultima_rag::Mode;

use crate::chain::{Exchange, RetrievalChain, get_chain};
use crate::credentials::{CredentialVerifier, Credentials};
use crate::error::{ChatError, Result};
use crate::models::ModelKind;
use crate::options::{Options, PROJECT_URL};
use crate::selector::Components;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message for the user describing the outcome of a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Running totals of token usage and cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// USD.
    pub total_cost: f64,
}

impl UsageTotals {
    pub fn record(&mut self, usage: &Usage, pricing: &Pricing) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total_tokens;
        self.total_cost += pricing.cost(usage);
    }
}

impl fmt::Display for UsageTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prompt tokens: {}, completion tokens: {}, total tokens: {}, total cost: ${:.4}",
            self.prompt_tokens, self.completion_tokens, self.total_tokens, self.total_cost
        )
    }
}

/// Everything one conversation knows.
#[derive(Debug)]
pub struct SessionState {
    options: Options,
    credentials: Credentials,
    auth_ok: bool,
    data_source: String,
    chain: Option<RetrievalChain>,
    history: Vec<Exchange>,
    usage: UsageTotals,
}

impl SessionState {
    /// A fresh, unauthenticated session without a chain.
    pub fn new(options: Options) -> Self {
        Self {
            options,
            credentials: Credentials::default(),
            auth_ok: false,
            data_source: PROJECT_URL.to_string(),
            chain: None,
            history: Vec::new(),
            usage: UsageTotals::default(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn auth_ok(&self) -> bool {
        self.auth_ok
    }

    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    pub fn chain(&self) -> Option<&RetrievalChain> {
        self.chain.as_ref()
    }

    pub fn history(&self) -> &[Exchange] {
        &self.history
    }

    pub fn usage(&self) -> &UsageTotals {
        &self.usage
    }

    /// Chains can be built once authenticated, or at any time in local mode.
    pub fn can_start(&self) -> bool {
        self.auth_ok || self.options.mode == Mode::Local
    }

    /// Resolve credentials from `input` and the environment, then check them
    /// against both services.
    ///
    /// On failure the session is unauthenticated and the stored credentials
    /// are left untouched; the cause is logged but not shown.
    pub async fn authenticate(
        mut self,
        input: Credentials,
        verifier: &dyn CredentialVerifier,
    ) -> (Self, Notice) {
        let credentials = Credentials::resolve(input);
        if !credentials.is_complete() {
            self.auth_ok = false;
            return (self, Notice::error("Credentials neither set nor stored"));
        }

        if let Err(e) = verifier.verify(&credentials).await {
            error!(error = %e, "Authentication failed");
            self.auth_ok = false;
            return (self, Notice::error("Authentication failed"));
        }

        self.credentials = credentials;
        self.auth_ok = true;
        info!("Authentication successful");
        (self, Notice::info("Authentication successful"))
    }

    /// Rebuild the chain from the current data source and options.
    ///
    /// Success replaces the chain and clears the chat history. Failure keeps
    /// the previous chain and history.
    pub async fn update_chain(mut self, components: &dyn Components) -> (Self, Notice) {
        match get_chain(&self.data_source, &self.options, &self.credentials, components).await {
            Ok(chain) => {
                self.chain = Some(chain);
                self.history.clear();
                let message = format!(
                    "Data source {} is ready to go with model {}!",
                    self.data_source, self.options.model
                );
                info!("{message}");
                (self, Notice::info(message))
            }
            Err(e) => {
                let e = ChatError::Build {
                    data_source: self.data_source.clone(),
                    model: self.options.model.to_string(),
                    message: e.to_string(),
                };
                error!("{e}");
                (self, Notice::error(e.to_string()))
            }
        }
    }

    /// Rebuild only when a chain already exists and the session may start.
    async fn rebuild_if_active(
        self,
        components: &dyn Components,
        notice: Notice,
    ) -> (Self, Notice) {
        if self.chain.is_some() && self.can_start() {
            self.update_chain(components).await
        } else {
            (self, notice)
        }
    }

    /// Switch mode and pick the first model available in it.
    pub async fn set_mode(mut self, mode: Mode, components: &dyn Components) -> (Self, Notice) {
        self.options.mode = mode;
        if self.options.model.mode() != mode {
            if let Some(model) = ModelKind::for_mode(mode).first() {
                self.options.model = *model;
            }
        }
        let notice = Notice::info(format!("Mode set to {mode}, model {}", self.options.model));
        self.rebuild_if_active(components, notice).await
    }

    /// Switch to `model`, which must be available in the current mode.
    pub async fn set_model(
        mut self,
        model: ModelKind,
        components: &dyn Components,
    ) -> (Self, Notice) {
        if model.mode() != self.options.mode {
            let notice = Notice::error(format!(
                "Model {model} is not available in {} mode",
                self.options.mode
            ));
            return (self, notice);
        }
        self.options.model = model;
        let notice = Notice::info(format!("Model set to {model}"));
        self.rebuild_if_active(components, notice).await
    }

    /// Replace all options after validating them.
    pub async fn set_options(
        mut self,
        options: Options,
        components: &dyn Components,
    ) -> (Self, Notice) {
        if let Err(e) = options.validate() {
            warn!(error = %e, "rejected options");
            return (self, Notice::error(e.to_string()));
        }
        if options == self.options {
            return (self, Notice::info("Options unchanged"));
        }
        self.options = options;
        self.rebuild_if_active(components, Notice::info("Options updated")).await
    }

    /// Point the session at another file, directory or URL.
    pub async fn set_data_source(
        mut self,
        data_source: impl Into<String>,
        components: &dyn Components,
    ) -> (Self, Notice) {
        self.data_source = data_source.into();
        let notice = Notice::info(format!("Data source set to {}", self.data_source));
        self.rebuild_if_active(components, notice).await
    }

    /// Answer `prompt` with the current chain and the full history.
    ///
    /// The exchange is appended to the history and its usage added to the
    /// totals only when the chain call succeeds.
    pub async fn generate_response(mut self, prompt: &str) -> (Self, Result<String>) {
        let Some(chain) = self.chain.as_ref() else {
            return (self, Err(ChatError::NoChain));
        };

        match chain.call(prompt, &self.history).await {
            Ok(response) => {
                let pricing = Pricing::for_model(chain.model().name());
                self.usage.record(&response.usage, &pricing);
                info!(
                    sources = response.sources.len(),
                    prompt_tokens = self.usage.prompt_tokens,
                    completion_tokens = self.usage.completion_tokens,
                    total_cost = self.usage.total_cost,
                    "Response generated"
                );
                self.history.push((prompt.to_string(), response.answer.clone()));
                (self, Ok(response.answer))
            }
            Err(e) => {
                error!(error = %e, "Failed to generate response");
                (self, Err(e))
            }
        }
    }
}
