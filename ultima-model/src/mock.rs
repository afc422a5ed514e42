//! A scripted model for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ModelError, Result};
use crate::llm::{Llm, LlmRequest, LlmResponse, Usage};

/// A model that replays scripted answers and records every request.
///
/// When the script runs out, the last user message is echoed back. Usage is
/// counted in whitespace-separated words.
///
/// ```rust,ignore
/// let model = MockLlm::new("mock").with_response("Paris");
/// ```
pub struct MockLlm {
    name: String,
    responses: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue an answer.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(Err(ModelError::Inference(message.into())));
        self
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn push(&self, response: Result<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }
}

fn words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let prompt_tokens = request.messages.iter().map(|m| words(&m.content)).sum();
        let echo = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let scripted = self.responses.lock().ok().and_then(|mut queue| queue.pop_front());
        let text = scripted.unwrap_or(Ok(echo))?;
        let usage = Usage::new(prompt_tokens, words(&text));
        Ok(LlmResponse { text, usage })
    }
}
