//! Integration tests for configuration loading and validation

use gemlab_core::config::{
    load_from_json, load_from_path, load_from_yaml, ConfigError, EmbedderKind,
    ValidationErrorKind,
};
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to create a test config file
fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_valid_yaml_config() {
    env::set_var("GEMLAB_TEST_YAML_KEY", "AIzaSyD-yaml-key");

    let yaml = r#"
version: "0.1"
api:
  api_key: ${GEMLAB_TEST_YAML_KEY}
models:
  chat: gemini-2.5-flash
  embedding: text-embedding-004
critique:
  max_iterations: 3
  pass_score: 8
rag:
  chunk_size: 300
  chunk_overlap: 30
  n_results: 5
  distance_threshold: 1.2
  embedder: gemini
output_dir: records
"#;

    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "gemlab.yaml", yaml);

    let config = load_from_yaml(path).unwrap();
    assert_eq!(config.api.api_key.expose_secret(), "AIzaSyD-yaml-key");
    assert_eq!(config.models.chat, "gemini-2.5-flash");
    assert_eq!(config.models.vision, "gemini-2.0-flash");
    assert_eq!(config.critique.max_iterations, 3);
    assert_eq!(config.critique.pass_score, 8);
    assert_eq!(config.rag.n_results, 5);
    assert_eq!(config.rag.distance_threshold, Some(1.2));
    assert_eq!(config.rag.embedder, EmbedderKind::Gemini);
    assert_eq!(config.output_dir, PathBuf::from("records"));

    env::remove_var("GEMLAB_TEST_YAML_KEY");
}

#[test]
fn test_load_valid_json_config() {
    env::set_var("GEMLAB_TEST_JSON_KEY", "AIzaSyD-json-key");
    env::set_var("GEMLAB_TEST_DIFY_KEY", "app-json");

    let json = r#"{
  "version": "0.1",
  "api": {
    "api_key": "${GEMLAB_TEST_JSON_KEY}",
    "request_timeout_ms": 30000
  },
  "agent": { "max_turns": 8 },
  "dify": {
    "base_url": "https://api.dify.ai/v1",
    "api_key": "${GEMLAB_TEST_DIFY_KEY}"
  }
}"#;

    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "gemlab.json", json);

    let config = load_from_path(path).unwrap();
    assert_eq!(config.api.api_key.expose_secret(), "AIzaSyD-json-key");
    assert_eq!(config.api.request_timeout_ms, 30_000);
    assert_eq!(config.agent.max_turns, 8);
    assert_eq!(config.rag.embedder, EmbedderKind::Hashing);

    let dify = config.dify.unwrap();
    assert_eq!(dify.api_key.expose_secret(), "app-json");
    assert_eq!(dify.user, "gemlab-user");

    env::remove_var("GEMLAB_TEST_JSON_KEY");
    env::remove_var("GEMLAB_TEST_DIFY_KEY");
}

#[test]
fn test_missing_env_var_is_reported() {
    let yaml = r#"
version: "0.1"
api:
  api_key: ${GEMLAB_TEST_NEVER_SET}
"#;

    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "gemlab.yaml", yaml);

    match load_from_yaml(path) {
        Err(ConfigError::EnvVarNotFound { var }) => assert_eq!(var, "GEMLAB_TEST_NEVER_SET"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_invalid_chunk_overlap_rejected() {
    let yaml = r#"
version: "0.1"
api:
  api_key: AIzaSyD-literal
rag:
  chunk_size: 100
  chunk_overlap: 100
"#;

    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "gemlab.yml", yaml);

    match load_from_path(path) {
        Err(ConfigError::ValidationError(err)) => {
            assert_eq!(err.field_path, "rag.chunk_overlap");
            assert!(matches!(err.kind, ValidationErrorKind::Incompatible { .. }));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_wrong_version_rejected() {
    let json = r#"{ "version": "2.0", "api": { "api_key": "AIzaSyD-literal" } }"#;

    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "gemlab.json", json);

    match load_from_json(path) {
        Err(ConfigError::ValidationError(err)) => {
            assert!(matches!(err.kind, ValidationErrorKind::InvalidVersion { .. }));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_bad_base_url_rejected() {
    let yaml = r#"
version: "0.1"
api:
  api_key: AIzaSyD-literal
  base_url: ftp://example.com
"#;

    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "gemlab.yaml", yaml);

    match load_from_yaml(path) {
        Err(ConfigError::ValidationError(err)) => {
            assert_eq!(err.field_path, "api.base_url");
            assert!(matches!(err.kind, ValidationErrorKind::InvalidUrl { .. }));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_parse_error_carries_location() {
    let yaml = "version: \"0.1\"\napi:\n  api_key: [unclosed\n";

    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "gemlab.yaml", yaml);

    match load_from_yaml(path) {
        Err(ConfigError::ParseError { line, .. }) => assert!(line.is_some()),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "gemlab.toml", "version = \"0.1\"");

    match load_from_path(path) {
        Err(ConfigError::UnsupportedFormat { extension }) => assert_eq!(extension, "toml"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result = load_from_yaml(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::IoError { .. })));
}
