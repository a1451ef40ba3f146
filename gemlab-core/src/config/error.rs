//! Errors raised while loading and checking a gemlab configuration

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config '{path}'{}: {message}", location(*.line, *.column))]
    ParseError {
        path: String,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    #[error(transparent)]
    ValidationError(#[from] ValidationError),

    #[error("Environment variable '{var}' is not set")]
    EnvVarNotFound { var: String },

    #[error("Unsupported config format '{extension}' (expected yaml, yml or json)")]
    UnsupportedFormat { extension: String },
}

impl ConfigError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.display().to_string(),
            source,
        }
    }
}

fn location(line: Option<usize>, column: Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" at {}:{}", line, column),
        (Some(line), None) => format!(" at line {}", line),
        _ => String::new(),
    }
}

/// A rejected value, addressed by its dotted path such as `rag.chunk_overlap`
#[derive(Debug, Error)]
#[error("Invalid '{field_path}': {kind}{}", .hint.as_ref().map(|h| format!(" ({})", h)).unwrap_or_default())]
pub struct ValidationError {
    pub field_path: String,
    pub kind: ValidationErrorKind,
    /// What the user can do about it
    pub hint: Option<String>,
}

#[derive(Debug, Error)]
pub enum ValidationErrorKind {
    #[error("value is required")]
    RequiredFieldMissing,

    #[error("{message}")]
    OutOfRange { message: String },

    #[error("bad URL, {message}")]
    InvalidUrl { message: String },

    #[error("version {actual} is not supported, use {expected}")]
    InvalidVersion { expected: String, actual: String },

    #[error("{message}")]
    Incompatible { message: String },
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn required(field_path: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::RequiredFieldMissing)
    }

    pub fn out_of_range(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::OutOfRange {
                message: message.into(),
            },
        )
    }

    pub fn incompatible(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::Incompatible {
                message: message.into(),
            },
        )
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
