//! Crate-wide error type
//!
//! Each module keeps its own error enum; [`GemlabError`] wraps them for
//! callers that drive several features at once.

use crate::agent::ToolError;
use crate::config::ConfigError;
use crate::critique::CritiqueError;
use crate::persistence::StoreError;
use crate::providers::ProviderError;
use crate::rag::{RagError, SplitError};
use crate::structured::StructuredError;
use crate::vision::VisionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GemlabError>;

#[derive(Debug, Error)]
pub enum GemlabError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Structured output error: {0}")]
    Structured(#[from] StructuredError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Critique loop error: {0}")]
    Critique(#[from] CritiqueError),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("Chunking error: {0}")]
    Split(#[from] SplitError),

    #[error("Retrieval error: {0}")]
    Rag(#[from] RagError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
