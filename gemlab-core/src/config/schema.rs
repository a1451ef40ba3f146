//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::critique::CritiqueConfig;
use crate::providers::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default REST root of the Gemini API
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GemlabConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// API endpoint and credentials
    pub api: ApiConfig,

    /// Model ids per use case
    #[serde(default)]
    pub models: ModelsConfig,

    /// Defaults applied to plain chat calls
    #[serde(default)]
    pub generation: GenerationDefaults,

    /// Retry policy for every model call
    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub agent: AgentSettings,

    /// Generator / auditor / refactorer loop
    #[serde(default)]
    pub critique: CritiqueConfig,

    #[serde(default)]
    pub rag: RagSettings,

    /// Directory for timestamped JSON records and generated documents
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Optional hosted workflow app (chat-messages API)
    #[serde(default)]
    pub dify: Option<DifySettings>,
}

/// API endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// API key (supports environment variable interpolation)
    pub api_key: SecretString,

    /// Base URL for the REST API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,
}

impl ApiConfig {
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_idle_per_host: default_max_idle(),
        }
    }
}

/// Model identifiers
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ModelsConfig {
    /// Chat, planning and critique roles
    pub chat: String,
    /// Multimodal image analysis
    pub vision: String,
    /// Text embeddings
    pub embedding: String,
    /// Tool-calling agent
    pub agent: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat: "gemini-2.0-flash".to_string(),
            vision: "gemini-2.0-flash".to_string(),
            embedding: "text-embedding-004".to_string(),
            agent: "gemini-2.0-flash".to_string(),
        }
    }
}

/// Generation defaults for chat sessions
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct GenerationDefaults {
    /// Sampling temperature; `None` keeps the service default
    pub temperature: Option<f32>,
}

/// Tool-calling agent settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AgentSettings {
    /// Upper bound on model calls per user query
    pub max_turns: u32,
    /// Temperature for agent calls
    pub temperature: f32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_turns: 5,
            temperature: 0.0,
        }
    }
}

/// Retrieval settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct RagSettings {
    /// JSON file backing the vector store
    pub store_path: PathBuf,
    /// Collection name inside the store
    pub collection: String,
    /// Chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Hits fetched per query
    pub n_results: usize,
    /// Hits farther than this (squared L2) are discarded
    pub distance_threshold: Option<f32>,
    /// Author recorded on technical document chunks
    pub tech_author: String,
    /// Subject recorded on diary entries
    pub diary_subject: String,
    /// Which embedder fills the store
    pub embedder: EmbedderKind,
    /// Vector length of the hashing embedder
    pub hashing_dimensions: usize,
}

/// Embedding backend for the vector store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Offline character n-gram hashing
    #[default]
    Hashing,
    /// The configured Gemini embedding model
    Gemini,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("rst/vector_store.json"),
            collection: "categorized_memory".to_string(),
            chunk_size: 400,
            chunk_overlap: 50,
            n_results: 3,
            distance_threshold: None,
            tech_author: "赵一清".to_string(),
            diary_subject: "胖墩墩".to_string(),
            embedder: EmbedderKind::Hashing,
            hashing_dimensions: 384,
        }
    }
}

/// Hosted workflow app connection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DifySettings {
    pub base_url: String,
    pub api_key: SecretString,
    /// End-user identifier the app keys its memory on
    #[serde(default = "default_dify_user")]
    pub user: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("rst")
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_connect_timeout() -> u64 {
    10_000
}
fn default_request_timeout() -> u64 {
    120_000
}
fn default_max_idle() -> usize {
    10
}
fn default_dify_user() -> String {
    "gemlab-user".to_string()
}

impl GemlabConfig {
    /// Configuration with defaults around the given API settings
    pub fn new(api: ApiConfig) -> Self {
        Self {
            version: "0.1".to_string(),
            api,
            models: ModelsConfig::default(),
            generation: GenerationDefaults::default(),
            retry: RetryPolicy::default(),
            agent: AgentSettings::default(),
            critique: CritiqueConfig::default(),
            rag: RagSettings::default(),
            output_dir: default_output_dir(),
            dify: None,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        if self.version != "0.1" {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: "0.1".to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        if self.api.api_key.is_empty() {
            return Err(ValidationError::required("api.api_key")
                .with_hint(format!("set {} or api.api_key", API_KEY_ENV)));
        }

        validate_url("api.base_url", &self.api.base_url)?;

        for (field, id) in [
            ("models.chat", &self.models.chat),
            ("models.vision", &self.models.vision),
            ("models.embedding", &self.models.embedding),
            ("models.agent", &self.models.agent),
        ] {
            if id.trim().is_empty() {
                return Err(ValidationError::required(field));
            }
        }

        if let Some(temperature) = self.generation.temperature {
            validate_temperature("generation.temperature", temperature)?;
        }
        validate_temperature("agent.temperature", self.agent.temperature)?;

        if self.agent.max_turns == 0 {
            return Err(ValidationError::out_of_range(
                "agent.max_turns",
                "must be at least 1",
            ));
        }

        if self.critique.max_iterations == 0 {
            return Err(ValidationError::out_of_range(
                "critique.max_iterations",
                "must be at least 1",
            ));
        }

        if self.critique.pass_score > 10 {
            return Err(ValidationError::out_of_range(
                "critique.pass_score",
                "scores range from 0 to 10",
            ));
        }

        if let Some(dify) = &self.dify {
            validate_url("dify.base_url", &dify.base_url)?;
            if dify.api_key.is_empty() {
                return Err(ValidationError::required("dify.api_key"));
            }
        }

        Ok(())
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(ValidationError::new(
            field,
            ValidationErrorKind::InvalidUrl {
                message: format!("unsupported scheme '{}'", url.scheme()),
            },
        )),
        Err(e) => Err(ValidationError::new(
            field,
            ValidationErrorKind::InvalidUrl {
                message: e.to_string(),
            },
        )),
    }
}

fn validate_temperature(field: &str, value: f32) -> Result<(), ValidationError> {
    if !(0.0..=2.0).contains(&value) {
        return Err(ValidationError::out_of_range(
            field,
            format!("temperature {} outside 0.0..=2.0", value),
        ));
    }
    Ok(())
}
