//! JSON-constrained generation
//!
//! Two ways to get structured data out of a model: scrape JSON from a
//! free-form reply ([`parse_lenient`]) or ask the API for JSON mode with a
//! response schema ([`StructuredGenerator`]). Both end in the same typed
//! parse and validation.

mod extract;
mod plan;

pub use extract::{escape_control_chars, extract_json, parse_lenient};
pub use plan::{render_plan_table, ModuleTask, Priority, ProjectPlan, PLANNER_PROMPT, PLAN_ARCHIVE_PREFIX};

use crate::protocol::GenerateContentRequest;
use crate::providers::{GenerativeModel, ProviderError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while extracting or validating structured output
#[derive(Debug, Error)]
pub enum StructuredError {
    #[error("Model returned no JSON content")]
    Empty,

    #[error("Invalid JSON: {message} (near: {snippet})")]
    InvalidJson { message: String, snippet: String },

    #[error("Validation failed at '{field}': {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl StructuredError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A type the model can be asked to produce directly
pub trait StructuredOutput: DeserializeOwned {
    /// Response schema in the API's OpenAPI subset
    fn schema() -> Value;

    /// Checks the schema cannot express
    fn validate(&self) -> Result<(), StructuredError> {
        Ok(())
    }
}

/// Runs a model in JSON mode and parses the reply
#[derive(Clone)]
pub struct StructuredGenerator {
    model: Arc<dyn GenerativeModel>,
    system_instruction: Option<String>,
    temperature: Option<f32>,
}

impl std::fmt::Debug for StructuredGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredGenerator")
            .field("model", &self.model.model_id())
            .finish()
    }
}

impl StructuredGenerator {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            system_instruction: None,
            temperature: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Generate with an explicit schema and parse into `T`
    pub async fn generate<T: DeserializeOwned>(
        &self,
        prompt: &str,
        schema: Value,
    ) -> Result<T, StructuredError> {
        let mut request = GenerateContentRequest::from_text(prompt).with_response_schema(schema);
        if let Some(instruction) = &self.system_instruction {
            request = request.with_system_instruction(instruction.clone());
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self.model.generate(&request).await?;
        let text = response.text().ok_or(StructuredError::Empty)?;
        debug!(chars = text.len(), "Structured reply received");

        parse_lenient(&text)
    }

    /// Generate a [`StructuredOutput`] and run its validation
    pub async fn generate_typed<T: StructuredOutput>(&self, prompt: &str) -> Result<T, StructuredError> {
        let value: T = self.generate(prompt, T::schema()).await?;
        if let Err(e) = value.validate() {
            warn!(error = %e, "Structured reply failed validation");
            return Err(e);
        }
        Ok(value)
    }
}
