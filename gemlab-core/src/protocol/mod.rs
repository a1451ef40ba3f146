//! Protocol module for Gemini request/response structures
//!
//! This module defines the data models exchanged with the hosted model API.
//! These structures are designed to be:
//! - Faithful to the REST wire format
//! - Lenient when decoding responses
//! - Convenient to build in tests and fixtures

pub mod types;

pub use types::{
    BatchEmbedContentsRequest, BatchEmbedContentsResponse, Candidate, Content, ContentEmbedding,
    EmbedContentRequest, EmbedContentResponse, FunctionCall, FunctionCallingConfig,
    FunctionCallingMode, FunctionDeclaration, FunctionResponse, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, InlineData, Part, PromptFeedback, Role, Tool,
    ToolConfig, UsageMetadata,
};
