//! Client for a hosted Dify workflow app (`chat-messages` API)

use super::error::ProviderResult;
use super::retry::{RetryExecutor, RetryPolicy};
use crate::config::{DifySettings, SecretString};
use crate::http::{CallKind, HttpClient, RequestOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

/// Blocking-mode request body
#[derive(Debug, Clone, Serialize)]
struct ChatMessageRequest<'a> {
    inputs: Map<String, Value>,
    query: &'a str,
    response_mode: &'static str,
    conversation_id: &'a str,
    user: &'a str,
}

/// Answer returned by the workflow app
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DifyReply {
    #[serde(default)]
    pub answer: String,

    #[serde(default)]
    pub conversation_id: Option<String>,

    /// Token usage reported under `metadata.usage`
    #[serde(default)]
    pub metadata: DifyMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DifyMetadata {
    #[serde(default)]
    pub usage: Option<Value>,
}

/// Conversation with a workflow app; follow-ups reuse the conversation id
#[derive(Debug, Clone)]
pub struct DifyClient {
    http: HttpClient,
    base_url: String,
    api_key: SecretString,
    user: String,
    conversation_id: Option<String>,
    retry: RetryExecutor,
}

impl DifyClient {
    pub fn new(settings: &DifySettings, retry: RetryPolicy) -> ProviderResult<Self> {
        Ok(Self {
            http: HttpClient::new()?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            user: settings.user.clone(),
            conversation_id: None,
            retry: RetryExecutor::new(retry),
        })
    }

    /// Conversation id assigned by the app after the first answer
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Forget the current conversation
    pub fn reset(&mut self) {
        self.conversation_id = None;
    }

    /// Ask one question in blocking mode
    pub async fn ask(&mut self, query: &str) -> ProviderResult<DifyReply> {
        let url = format!("{}{}", self.base_url, CallKind::ChatMessages.endpoint(""));
        let headers = [(
            "Authorization",
            format!("Bearer {}", self.api_key.expose_secret()),
        )];
        let body = ChatMessageRequest {
            inputs: Map::new(),
            query,
            response_mode: "blocking",
            conversation_id: self.conversation_id.as_deref().unwrap_or(""),
            user: &self.user,
        };

        let http = &self.http;
        let url = url.as_str();
        let headers = &headers[..];
        let body = &body;

        let reply: DifyReply = self
            .retry
            .run(move || {
                let options = RequestOptions::new(CallKind::ChatMessages);
                async move { http.post_json(url, headers, body, &options).await }
            })
            .await?;

        if let Some(id) = reply.conversation_id.as_ref().filter(|id| !id.is_empty()) {
            self.conversation_id = Some(id.clone());
        }

        info!(
            conversation_id = reply.conversation_id.as_deref().unwrap_or(""),
            usage = ?reply.metadata.usage,
            "Workflow app answered"
        );

        Ok(reply)
    }
}
