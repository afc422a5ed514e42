//! OpenAI chat completions client.
//!
//! This module is only available when the `openai` feature is enabled.

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{ModelError, Result};
use crate::llm::{ChatMessage, Llm, LlmRequest, LlmResponse, Role, Usage};

const PROVIDER: &str = "OpenAI";

/// A chat model served by the OpenAI API (or a compatible endpoint).
///
/// # Example
///
/// ```rust,ignore
/// use ultima_model::openai::OpenAIClient;
///
/// let model = OpenAIClient::new("sk-...", "gpt-4")?.with_temperature(0.25);
/// let response = model.generate(LlmRequest::new(vec![ChatMessage::user("Hi")])).await?;
/// ```
pub struct OpenAIClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
}

impl OpenAIClient {
    /// Create a client for `model` authenticated with `api_key`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ModelError::Config("OpenAI API key is required".into()));
        }

        let config = OpenAIConfig::new().with_api_key(api_key);
        Ok(Self { client: Client::with_config(config), model: model.into(), temperature: None })
    }

    /// Point the client at an OpenAI-compatible API.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        let config = self.client.config().clone().with_api_base(api_base);
        self.client = Client::with_config(config);
        self
    }

    /// Default temperature for requests that do not set one.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// List the models visible to the API key.
    ///
    /// This is a cheap call and doubles as a credential check.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let models = self.client.models().list().await.map_err(api_error)?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

fn api_error(e: OpenAIError) -> ModelError {
    ModelError::Api { provider: PROVIDER.into(), message: e.to_string() }
}

fn to_openai_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let content = message.content.clone();
    let converted = match message.role {
        Role::System => {
            ChatCompletionRequestSystemMessageArgs::default().content(content).build()?.into()
        }
        Role::User => {
            ChatCompletionRequestUserMessageArgs::default().content(content).build()?.into()
        }
        Role::Assistant => {
            ChatCompletionRequestAssistantMessageArgs::default().content(content).build()?.into()
        }
    };
    Ok(converted)
}

impl From<OpenAIError> for ModelError {
    fn from(e: OpenAIError) -> Self {
        ModelError::Config(format!("Failed to build request: {e}"))
    }
}

#[async_trait]
impl Llm for OpenAIClient {
    fn name(&self) -> &str {
        &self.model
    }

    #[instrument(
        skip(self, request),
        fields(model = %self.model, messages = request.messages.len())
    )]
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let messages =
            request.messages.iter().map(to_openai_message).collect::<Result<Vec<_>>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages);
        if let Some(temperature) = request.temperature.or(self.temperature) {
            builder.temperature(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder.max_tokens(max_tokens);
        }
        let openai_request = builder.build()?;

        let response = self.client.chat().create(openai_request).await.map_err(api_error)?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        let usage = response
            .usage
            .map(|u| Usage::new(u.prompt_tokens.into(), u.completion_tokens.into()))
            .unwrap_or_default();

        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "OpenAI completion received"
        );
        Ok(LlmResponse { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_a_config_error() {
        assert!(matches!(OpenAIClient::new("", "gpt-4"), Err(ModelError::Config(_))));
    }

    #[test]
    fn name_is_the_model_id() {
        let client = OpenAIClient::new("sk-test", "gpt-3.5-turbo").unwrap();
        assert_eq!(client.name(), "gpt-3.5-turbo");
    }

    #[test]
    fn every_role_converts() {
        for message in
            [ChatMessage::system("s"), ChatMessage::user("u"), ChatMessage::assistant("a")]
        {
            assert!(to_openai_message(&message).is_ok());
        }
    }
}
