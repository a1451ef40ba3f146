//! Provider error types and handling

use std::time::Duration;
use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur when talking to the model API
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Rate limit exceeded, retry after specified duration
    #[error("Rate limit exceeded{}", .retry_after.map(|d| format!(", retry after {:?}", d)).unwrap_or_default())]
    RateLimit { retry_after: Option<Duration> },

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Temporary server error (5xx)
    #[error("Server error ({status_code}): {message}")]
    ServerError { status_code: u16, message: String },

    /// Invalid request that should not be retried (4xx)
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Missing or rejected API key
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Model not available or unsupported
    #[error("Model '{model}' not available")]
    ModelNotAvailable { model: String },

    /// Generic network error
    #[error("Network error: {message}")]
    Network { message: String },

    /// The service answered but produced no usable candidate
    #[error("Empty response: {reason}")]
    EmptyResponse { reason: String },

    /// Response body could not be decoded
    #[error("Failed to parse response: {message}")]
    Parse { message: String },

    /// Provider-specific error
    #[error("Error [{code}]: {message}")]
    Custom { code: String, message: String },
}

impl ProviderError {
    /// Determine if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } => true,
            Self::Timeout => true,
            Self::ServerError { .. } => true,
            Self::Network { .. } => true,
            Self::InvalidRequest { .. } => false,
            Self::Authentication { .. } => false,
            Self::ModelNotAvailable { .. } => false,
            Self::EmptyResponse { .. } => false,
            Self::Parse { .. } => false,
            Self::Custom { .. } => false,
        }
    }

    /// Delay requested by the server, if any
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_connect() {
            ProviderError::Network {
                message: format!("Connection failed: {}", err),
            }
        } else if err.is_decode() {
            ProviderError::Parse {
                message: err.to_string(),
            }
        } else {
            ProviderError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse {
            message: err.to_string(),
        }
    }
}
