//! Conversational retrieval chain.
//!
//! A follow-up question is first condensed into a standalone question using
//! the chat history, then answered from the retrieved chunks "stuffed" into a
//! single prompt.

use std::sync::Arc;

use tracing::{debug, info, instrument};
use ultima_model::{ChatMessage, Llm, LlmRequest, Usage};
use ultima_rag::{
    DatasetIndex, SearchResult, Tokenizer, VectorStoreManager, VectorStoreRetriever,
};

use crate::credentials::Credentials;
use crate::error::Result;
use crate::options::Options;
use crate::selector::Components;

const CONDENSE_PROMPT: &str = "Given the conversation below and a follow-up question, \
rewrite the follow-up question as a standalone question in its original language.";

const QA_PROMPT: &str = "Answer the user's question using only the context below. \
If the context does not contain the answer, say that you don't know instead of making one up.";

/// A (question, answer) pair of the conversation so far.
pub type Exchange = (String, String);

/// The result of one chain call.
#[derive(Debug, Clone)]
pub struct ChainResponse {
    pub answer: String,
    /// The chunks the answer was generated from, most relevant first.
    pub sources: Vec<SearchResult>,
    /// The summed usage of every model call made for this answer.
    pub usage: Usage,
}

/// Retriever, model and prompt policy for one data source and one set of options.
pub struct RetrievalChain {
    data_source: String,
    index: DatasetIndex,
    retriever: VectorStoreRetriever,
    model: Arc<dyn Llm>,
    tokenizer: Arc<dyn Tokenizer>,
    max_tokens: usize,
    temperature: f32,
}

impl std::fmt::Debug for RetrievalChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalChain")
            .field("data_source", &self.data_source)
            .field("dataset", &self.index.path.to_string())
            .field("model", &self.model.name())
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn render_history(history: &[Exchange]) -> String {
    history
        .iter()
        .map(|(question, answer)| format!("Human: {question}\nAssistant: {answer}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop the least relevant results until their combined text fits `limit` tokens.
pub fn truncate_to_budget(
    mut results: Vec<SearchResult>,
    tokenizer: &dyn Tokenizer,
    limit: usize,
) -> Vec<SearchResult> {
    let counts: Vec<usize> = results.iter().map(|r| tokenizer.count(&r.chunk.text)).collect();
    let mut total: usize = counts.iter().sum();
    let mut keep = results.len();
    while keep > 0 && total > limit {
        keep -= 1;
        total -= counts[keep];
    }
    results.truncate(keep);
    results
}

impl RetrievalChain {
    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    pub fn dataset(&self) -> &DatasetIndex {
        &self.index
    }

    pub fn model(&self) -> &Arc<dyn Llm> {
        &self.model
    }

    /// Token cap on the retrieved context of one prompt.
    pub fn context_budget(&self) -> usize {
        self.max_tokens
    }

    /// Answer `question` given the conversation so far.
    #[instrument(skip(self, history), fields(model = %self.model.name(), history = history.len()))]
    pub async fn call(&self, question: &str, history: &[Exchange]) -> Result<ChainResponse> {
        let mut usage = Usage::default();

        let standalone = if history.is_empty() {
            question.to_string()
        } else {
            let request = LlmRequest::new(vec![
                ChatMessage::system(CONDENSE_PROMPT),
                ChatMessage::user(format!(
                    "Chat history:\n{}\n\nFollow-up question: {question}\nStandalone question:",
                    render_history(history)
                )),
            ])
            .with_temperature(self.temperature);
            let response = self.model.generate(request).await?;
            usage += response.usage;
            let condensed = response.text.trim();
            if condensed.is_empty() { question.to_string() } else { condensed.to_string() }
        };
        debug!(standalone = %standalone, "question to retrieve for");

        let retrieved = self.retriever.retrieve(&standalone).await?;
        let found = retrieved.len();
        let sources = truncate_to_budget(retrieved, self.tokenizer.as_ref(), self.max_tokens);
        debug!(found, kept = sources.len(), max_tokens = self.max_tokens, "context assembled");

        let context =
            sources.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let request = LlmRequest::new(vec![
            ChatMessage::system(format!("{QA_PROMPT}\n\n{context}")),
            ChatMessage::user(standalone),
        ])
        .with_temperature(self.temperature);
        let response = self.model.generate(request).await?;
        usage += response.usage;

        Ok(ChainResponse { answer: response.text, sources, usage })
    }
}

/// Build the dataset for `data_source` if needed and wire it to the selected model.
#[instrument(skip(options, credentials, components), fields(model = %options.model))]
pub async fn get_chain(
    data_source: &str,
    options: &Options,
    credentials: &Credentials,
    components: &dyn Components,
) -> Result<RetrievalChain> {
    options.validate()?;

    let tokenizer = components.tokenizer(options)?;
    let manager = VectorStoreManager::builder()
        .config(options.index_config(credentials.org(), components.settings())?)
        .embedding_provider(components.embeddings(options, credentials)?)
        .vector_store(components.vector_store(options, credentials)?)
        .tokenizer(Arc::clone(&tokenizer))
        .build()?;

    let index = manager.get_vector_store(data_source).await?;
    let retriever = manager.retriever(&index, options.search_params())?;
    let model = components.model(options, credentials).await?;

    info!(
        data_source,
        dataset = %index.path,
        created = index.created,
        k = options.k,
        fetch_k = options.fetch_k,
        "chain built"
    );
    Ok(RetrievalChain {
        data_source: data_source.to_string(),
        index,
        retriever,
        model,
        tokenizer,
        max_tokens: options.context_budget(),
        temperature: options.temperature,
    })
}
