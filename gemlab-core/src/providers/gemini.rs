//! REST client for the Gemini API
//!
//! One client is bound to one model id. [`GeminiClient::with_model`] hands
//! out siblings that share the connection pool, so the CLI can keep a chat
//! model, a vision model and an embedding model side by side.

use super::error::{ProviderError, ProviderResult};
use super::retry::{RetryExecutor, RetryPolicy};
use super::{Embedder, GenerativeModel};
use crate::config::{ApiConfig, GemlabConfig, SecretString};
use crate::http::{CallKind, HttpClient, RequestOptions};
use crate::protocol::{
    BatchEmbedContentsRequest, BatchEmbedContentsResponse, EmbedContentRequest,
    EmbedContentResponse, GenerateContentRequest, GenerateContentResponse,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Client for `generateContent`, `embedContent` and `batchEmbedContents`
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: HttpClient,
    base_url: String,
    api_key: SecretString,
    model: String,
    retry: RetryExecutor,
    request_timeout: Duration,
}

impl GeminiClient {
    /// Build a client for `model` from API settings
    pub fn new(
        api: &ApiConfig,
        model: impl Into<String>,
        retry: RetryPolicy,
    ) -> ProviderResult<Self> {
        if api.api_key.is_empty() {
            return Err(ProviderError::Authentication {
                message: "API key is empty".to_string(),
            });
        }

        let http = HttpClient::with_config(
            Duration::from_millis(api.connect_timeout_ms),
            Duration::from_millis(api.request_timeout_ms),
            api.max_idle_per_host,
        )?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            api_key: api.api_key.clone(),
            model: model.into(),
            retry: RetryExecutor::new(retry),
            request_timeout: Duration::from_millis(api.request_timeout_ms),
        })
    }

    /// Build a client from the loaded configuration
    pub fn from_config(config: &GemlabConfig, model: impl Into<String>) -> ProviderResult<Self> {
        Self::new(&config.api, model, config.retry.clone())
    }

    /// Sibling client for another model sharing the same connection pool
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.retry.policy()
    }

    fn url(&self, call_kind: CallKind) -> String {
        format!("{}{}", self.base_url, call_kind.endpoint(&self.model))
    }

    async fn call<B, R>(&self, call_kind: CallKind, body: &B) -> ProviderResult<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(call_kind);
        let headers = [(API_KEY_HEADER, self.api_key.expose_secret().to_string())];

        let http = &self.http;
        let url = url.as_str();
        let headers = &headers[..];
        let timeout = self.request_timeout;

        self.retry
            .run(move || {
                let options = RequestOptions::new(call_kind).with_timeout(timeout);
                async move { http.post_json(url, headers, body, &options).await }
            })
            .await
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model, turns = request.contents.len()))]
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> ProviderResult<GenerateContentResponse> {
        let response: GenerateContentResponse =
            self.call(CallKind::GenerateContent, request).await?;

        if response.candidates.is_empty() {
            let reason = response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone())
                .map(|r| format!("prompt blocked: {}", r))
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(ProviderError::EmptyResponse { reason });
        }

        if let Some(usage) = response.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                total_tokens = usage.total_token_count,
                "Generation finished"
            );
        }

        Ok(response)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let request = EmbedContentRequest::new(&self.model, text);
        let response: EmbedContentResponse = self.call(CallKind::EmbedContent, &request).await?;

        if response.embedding.values.is_empty() {
            return Err(ProviderError::EmptyResponse {
                reason: "embedding has no values".to_string(),
            });
        }

        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> ProviderResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|t| EmbedContentRequest::new(&self.model, t.as_str()))
                .collect(),
        };
        let response: BatchEmbedContentsResponse =
            self.call(CallKind::BatchEmbedContents, &request).await?;

        if response.embeddings.len() != texts.len() {
            return Err(ProviderError::Parse {
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    response.embeddings.len()
                ),
            });
        }

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        let err = GeminiClient::new(&ApiConfig::new(""), "gemini-2.0-flash", RetryPolicy::default())
            .unwrap_err();
        assert!(matches!(err, ProviderError::Authentication { .. }));
    }

    #[test]
    fn test_url_and_sibling_model() {
        let mut api = ApiConfig::new("AIza-test");
        api.base_url = "http://localhost:9999/v1beta/".to_string();
        let chat = GeminiClient::new(&api, "gemini-2.0-flash", RetryPolicy::no_retry()).unwrap();
        let embed = chat.with_model("text-embedding-004");

        assert_eq!(
            chat.url(CallKind::GenerateContent),
            "http://localhost:9999/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(
            embed.url(CallKind::EmbedContent),
            "http://localhost:9999/v1beta/models/text-embedding-004:embedContent"
        );
        assert_eq!(GenerativeModel::model_id(&embed), "text-embedding-004");
    }
}
