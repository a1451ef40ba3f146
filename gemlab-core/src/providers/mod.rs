//! Model clients
//!
//! Everything above this layer talks to a [`GenerativeModel`] or an
//! [`Embedder`] trait object, so the chat, critique, agent and retrieval
//! code runs the same against the hosted API, a scripted test double or
//! the offline hashing embedder.

pub mod dify;
pub mod error;
pub mod gemini;
pub mod hashing;
pub mod mock;
pub mod retry;

pub use dify::{DifyClient, DifyReply};
pub use error::{ProviderError, ProviderResult};
pub use gemini::GeminiClient;
pub use hashing::HashingEmbedder;
pub use mock::{ScriptedEmbedder, ScriptedModel};
pub use retry::{RetryExecutor, RetryPolicy, RetryReport};

use crate::protocol::{GenerateContentRequest, GenerateContentResponse};
use async_trait::async_trait;

/// A model that turns a conversation into a generated candidate
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier used on the wire
    fn model_id(&self) -> &str;

    /// Run one `generateContent` call
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> ProviderResult<GenerateContentResponse>;
}

/// A text embedding backend
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Short name recorded alongside stored vectors
    fn name(&self) -> &str;

    /// Embed a single text
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> ProviderResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}
