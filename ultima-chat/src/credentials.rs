//! Credentials for the model API and the index service.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const INDEX_TOKEN_ENV: &str = "ULTIMA_INDEX_TOKEN";
pub const INDEX_ORG_ENV: &str = "ULTIMA_INDEX_ORG";
pub const INDEX_URL_ENV: &str = "ULTIMA_INDEX_URL";

/// gRPC endpoint used when no index URL is configured.
pub const DEFAULT_INDEX_URL: &str = "http://localhost:6334";

/// Name of the dataset looked up to check index credentials.
pub const AUTH_CHECK_DATASET: &str = "AREA-Authentication-Check";

/// Secrets needed in API mode. `Debug` never shows the secret values.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub index_token: Option<String>,
    pub index_org: Option<String>,
    pub index_url: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("index_token", &redact(&self.index_token))
            .field("index_org", &self.index_org)
            .field("index_url", &self.index_url)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Credentials {
    pub fn new(
        openai_api_key: impl Into<String>,
        index_token: impl Into<String>,
        index_org: impl Into<String>,
    ) -> Self {
        Self {
            openai_api_key: Some(openai_api_key.into()),
            index_token: Some(index_token.into()),
            index_org: Some(index_org.into()),
            index_url: None,
        }
    }

    /// Fill every field left empty in `input` from the process environment.
    pub fn resolve(input: Credentials) -> Self {
        Self::resolve_with(input, |key| std::env::var(key).ok())
    }

    /// Like [`resolve`](Self::resolve) with an explicit variable lookup.
    pub fn resolve_with(input: Credentials, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |value: Option<String>, key: &str| {
            non_empty(value).or_else(|| non_empty(lookup(key)))
        };
        Self {
            openai_api_key: pick(input.openai_api_key, OPENAI_API_KEY_ENV),
            index_token: pick(input.index_token, INDEX_TOKEN_ENV),
            index_org: pick(input.index_org, INDEX_ORG_ENV),
            index_url: pick(input.index_url, INDEX_URL_ENV),
        }
    }

    /// The API key, the index token and the organization are all present.
    pub fn is_complete(&self) -> bool {
        self.openai_api_key.is_some() && self.index_token.is_some() && self.index_org.is_some()
    }

    pub fn index_url(&self) -> &str {
        self.index_url.as_deref().unwrap_or(DEFAULT_INDEX_URL)
    }

    pub fn org(&self) -> &str {
        self.index_org.as_deref().unwrap_or_default()
    }
}

/// A live check of credentials against the services they are for.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Succeeds when both services accepted the credentials.
    async fn verify(&self, credentials: &Credentials) -> Result<()>;
}

/// Lists models on the OpenAI API and looks up a dataset on the index service.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveVerifier;

#[async_trait]
impl CredentialVerifier for LiveVerifier {
    #[cfg(all(feature = "openai", feature = "qdrant"))]
    async fn verify(&self, credentials: &Credentials) -> Result<()> {
        use ultima_model::openai::OpenAIClient;
        use ultima_rag::dataset::DatasetPath;
        use ultima_rag::qdrant::QdrantVectorStore;
        use ultima_rag::VectorStore;

        use crate::error::ChatError;

        let key = credentials.openai_api_key.as_deref().unwrap_or_default();
        OpenAIClient::new(key, "")?.list_models().await?;

        let check = DatasetPath::Hub {
            org: credentials.org().to_string(),
            name: AUTH_CHECK_DATASET.to_string(),
        };
        let store =
            QdrantVectorStore::new(credentials.index_url(), credentials.index_token.as_deref())?;
        store
            .collection_exists(&check.collection_name())
            .await
            .map_err(|e| ChatError::Auth(e.to_string()))?;
        Ok(())
    }

    #[cfg(not(all(feature = "openai", feature = "qdrant")))]
    async fn verify(&self, _credentials: &Credentials) -> Result<()> {
        Err(crate::error::ChatError::Auth(
            "API mode needs the `openai` and `qdrant` features".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_wins_over_environment() {
        let env = |key: &str| Some(format!("env-{key}"));
        let input = Credentials { openai_api_key: Some("sk-input".into()), ..Default::default() };
        let resolved = Credentials::resolve_with(input, env);
        assert_eq!(resolved.openai_api_key.as_deref(), Some("sk-input"));
        assert_eq!(resolved.index_org.as_deref(), Some("env-ULTIMA_INDEX_ORG"));
        assert!(resolved.is_complete());
    }

    #[test]
    fn blank_values_count_as_missing() {
        let input = Credentials::new("  ", "token", "org");
        let resolved = Credentials::resolve_with(input, |_| None);
        assert_eq!(resolved.openai_api_key, None);
        assert!(!resolved.is_complete());
        assert_eq!(resolved.index_url(), DEFAULT_INDEX_URL);
    }

    #[test]
    fn debug_hides_secrets() {
        let shown = format!("{:?}", Credentials::new("sk-secret", "tok-secret", "acme"));
        assert!(!shown.contains("sk-secret"));
        assert!(!shown.contains("tok-secret"));
        assert!(shown.contains("acme"));
    }
}
