//! Configuration module for gemlab
//!
//! Loads the API credentials, model ids and per-feature tuning knobs from
//! YAML or JSON, interpolates `${VAR}` placeholders from the environment,
//! and validates the result before anything talks to the network.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::{interpolate_config_env_vars, interpolate_env_vars};
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    AgentSettings, ApiConfig, DifySettings, EmbedderKind, GemlabConfig, GenerationDefaults,
    ModelsConfig, RagSettings, API_KEY_ENV, DEFAULT_BASE_URL,
};
pub use secrets::SecretString;
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;

impl GemlabConfig {
    /// Default configuration keyed by `GEMINI_API_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound {
                var: API_KEY_ENV.to_string(),
            })?;

        let config = Self::new(ApiConfig::new(api_key));
        ConfigValidator::new().validate(&config)?;
        Ok(config)
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;

    // Interpolate environment variables before parsing
    env::interpolate_env_vars(&content)
}

fn finish(mut config: GemlabConfig) -> Result<GemlabConfig, ConfigError> {
    env::interpolate_config_env_vars(&mut config)?;

    let validator = ConfigValidator::new();
    validator.validate(&config)?;
    Ok(config)
}

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<GemlabConfig, ConfigError> {
    let path = path.as_ref();
    let interpolated = read_config(path)?;

    let config: GemlabConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    finish(config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<GemlabConfig, ConfigError> {
    let path = path.as_ref();
    let interpolated = read_config(path)?;

    let config: GemlabConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    finish(config)
}

/// Load a configuration, picking the format from the file extension
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<GemlabConfig, ConfigError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "yaml" | "yml" => load_from_yaml(path),
        "json" => load_from_json(path),
        _ => Err(ConfigError::UnsupportedFormat { extension }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = r#"
version: "0.1"
api:
  api_key: AIzaSyD-test
models:
  chat: gemini-2.5-flash
rag:
  chunk_size: 200
  chunk_overlap: 20
  distance_threshold: 25.0
"#;
        let config: GemlabConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.models.chat, "gemini-2.5-flash");
        assert_eq!(config.models.embedding, "text-embedding-004");
        assert_eq!(config.rag.chunk_size, 200);
        assert_eq!(config.rag.distance_threshold, Some(25.0));
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
version: "0.1"
api:
  api_key: AIzaSyD-test
surprise: true
"#;
        assert!(serde_yaml::from_str::<GemlabConfig>(yaml).is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_from_path("gemlab.toml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { extension } if extension == "toml"));
    }
}
