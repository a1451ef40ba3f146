//! Scripted model implementations for testing and offline demos.
//!
//! [`ScriptedModel`] replays queued responses in order and records every
//! request it receives, so loops built on [`GenerativeModel`] can be driven
//! and inspected without network access.

use super::error::{ProviderError, ProviderResult};
use super::{Embedder, GenerativeModel};
use crate::protocol::{Content, GenerateContentRequest, GenerateContentResponse, Part};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A model that answers from a queue of prepared responses.
///
/// Once the queue is drained every call fails with a `SCRIPT_EXHAUSTED`
/// error, which makes runaway loops visible in tests.
#[derive(Debug)]
pub struct ScriptedModel {
    model_id: String,
    responses: Mutex<VecDeque<ProviderResult<GenerateContentResponse>>>,
    requests: Mutex<Vec<GenerateContentRequest>>,
}

impl ScriptedModel {
    /// Create a scripted model with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model_id: "scripted-model".to_string(),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Scripted model answering each call with the next text.
    #[must_use]
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new();
        for text in texts {
            model.push_text(text);
        }
        model
    }

    /// Use a custom model ID.
    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Queue a plain text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.push_response(GenerateContentResponse::from_text(text));
    }

    /// Queue a reply holding one function call per `(name, args)` pair.
    pub fn push_function_calls(&self, calls: Vec<(&str, Value)>) {
        let parts = calls
            .into_iter()
            .map(|(name, args)| Part::function_call(name, args))
            .collect();
        self.push_response(GenerateContentResponse::from_content(Content {
            role: Some(crate::protocol::Role::Model),
            parts,
        }));
    }

    /// Queue an arbitrary response.
    pub fn push_response(&self, response: GenerateContentResponse) {
        lock(&self.responses).push_back(Ok(response));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: ProviderError) {
        lock(&self.responses).push_back(Err(error));
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerateContentRequest> {
        lock(&self.requests).clone()
    }

    /// Responses still waiting in the queue.
    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> ProviderResult<GenerateContentResponse> {
        lock(&self.requests).push(request.clone());
        let next = lock(&self.responses).pop_front();
        next.unwrap_or_else(|| {
            Err(ProviderError::Custom {
                code: "SCRIPT_EXHAUSTED".to_string(),
                message: "no scripted response left".to_string(),
            })
        })
    }
}

/// An embedder returning fixed vectors per text, falling back to a default.
#[derive(Debug, Default)]
pub struct ScriptedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Option<Vec<f32>>,
    failing: Vec<String>,
}

impl ScriptedEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `vector` for `text`.
    #[must_use]
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    /// Return `vector` for any text without a prepared entry.
    #[must_use]
    pub fn with_fallback(mut self, vector: Vec<f32>) -> Self {
        self.fallback = Some(vector);
        self
    }

    /// Fail whenever `text` is embedded.
    #[must_use]
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.failing.push(text.into());
        self
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    fn name(&self) -> &str {
        "scripted-embedder"
    }

    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        if self.failing.iter().any(|t| t == text) {
            return Err(ProviderError::ServerError {
                status_code: 500,
                message: format!("scripted failure for '{}'", text),
            });
        }

        self.vectors
            .get(text)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| ProviderError::EmptyResponse {
                reason: format!("no scripted vector for '{}'", text),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_model_replays_in_order() {
        let model = ScriptedModel::from_texts(["first", "second"]);
        let request = GenerateContentRequest::from_text("hi");

        let r1 = model.generate(&request).await.unwrap();
        assert_eq!(r1.text(), Some("first".to_string()));
        let r2 = model.generate(&request).await.unwrap();
        assert_eq!(r2.text(), Some("second".to_string()));

        let err = model.generate(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::Custom { code, .. } if code == "SCRIPT_EXHAUSTED"));
        assert_eq!(model.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_function_calls() {
        let model = ScriptedModel::new();
        model.push_function_calls(vec![("get_name_info", json!({"role": "小狗"}))]);

        let response = model
            .generate(&GenerateContentRequest::from_text("?"))
            .await
            .unwrap();
        assert!(response.has_function_call());
        assert_eq!(response.function_calls()[0].name, "get_name_info");
    }

    #[tokio::test]
    async fn test_scripted_embedder_fallback_and_failure() {
        let embedder = ScriptedEmbedder::new()
            .with_vector("a", vec![1.0, 0.0])
            .with_fallback(vec![0.0, 1.0])
            .failing_on("boom");

        assert_eq!(embedder.embed("a").await.unwrap(), vec![1.0, 0.0]);
        assert_eq!(embedder.embed("zzz").await.unwrap(), vec![0.0, 1.0]);
        assert!(embedder.embed("boom").await.is_err());
    }
}
