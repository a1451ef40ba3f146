//! HTTP plumbing shared by the Gemini and Dify clients
//!
//! Every request carries an `X-Request-ID` so failures in the logs can be
//! matched to the call that produced them.

pub mod client;
pub mod error;

pub use client::HttpClient;
pub use error::{map_http_error, parse_retry_after};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Type of API call being made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    /// Text / multimodal generation, optionally with function calling
    GenerateContent,
    /// Single text embedding
    EmbedContent,
    /// Several embeddings in one round trip
    BatchEmbedContents,
    /// Hosted workflow app conversation turn
    ChatMessages,
}

impl CallKind {
    /// RPC method name appended to the model path
    pub fn method(&self) -> &'static str {
        match self {
            CallKind::GenerateContent => "generateContent",
            CallKind::EmbedContent => "embedContent",
            CallKind::BatchEmbedContents => "batchEmbedContents",
            CallKind::ChatMessages => "chat-messages",
        }
    }

    /// Endpoint path for this call kind on `model`
    pub fn endpoint(&self, model: &str) -> String {
        match self {
            CallKind::ChatMessages => format!("/{}", self.method()),
            _ => format!("/models/{}:{}", model, self.method()),
        }
    }
}

/// Options for an HTTP request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Type of API call
    pub call_kind: CallKind,

    /// Unique request ID for correlation
    pub request_id: Uuid,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            call_kind: CallKind::GenerateContent,
            request_id: Uuid::new_v4(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl RequestOptions {
    /// Create new request options with a generated request ID
    pub fn new(call_kind: CallKind) -> Self {
        Self {
            call_kind,
            request_id: Uuid::new_v4(),
            ..Default::default()
        }
    }

    /// Set the timeout for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(
            CallKind::GenerateContent.endpoint("gemini-2.0-flash"),
            "/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(
            CallKind::BatchEmbedContents.endpoint("text-embedding-004"),
            "/models/text-embedding-004:batchEmbedContents"
        );
        assert_eq!(CallKind::ChatMessages.endpoint("ignored"), "/chat-messages");
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestOptions::new(CallKind::EmbedContent);
        let b = RequestOptions::new(CallKind::EmbedContent);
        assert_ne!(a.request_id, b.request_id);
    }
}
