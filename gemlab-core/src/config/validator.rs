//! Configuration validation utilities

use super::env::has_placeholder;
use super::error::ValidationError;
use super::schema::{EmbedderKind, GemlabConfig};
use tracing::warn;

/// Configuration validator with rules spanning several sections
#[derive(Debug, Default)]
pub struct ConfigValidator {
    _private: (),
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &GemlabConfig) -> Result<(), ValidationError> {
        config.validate()?;

        self.validate_placeholders(config)?;
        self.validate_rag(config)?;
        self.validate_retry(config)?;

        Ok(())
    }

    /// Placeholders left after interpolation point at a broken load path
    fn validate_placeholders(&self, config: &GemlabConfig) -> Result<(), ValidationError> {
        if has_placeholder(config.api.api_key.expose_secret()) {
            return Err(ValidationError::incompatible(
                "api.api_key",
                "environment placeholder was not interpolated",
            ));
        }

        if !config.api.api_key.expose_secret().starts_with("AIza") {
            warn!(
                key = %config.api.api_key.masked(),
                "API key does not look like a Google API key"
            );
        }

        Ok(())
    }

    fn validate_rag(&self, config: &GemlabConfig) -> Result<(), ValidationError> {
        let rag = &config.rag;

        if rag.chunk_size == 0 {
            return Err(ValidationError::out_of_range(
                "rag.chunk_size",
                "must be at least 1",
            ));
        }

        if rag.chunk_overlap >= rag.chunk_size {
            return Err(ValidationError::incompatible(
                "rag.chunk_overlap",
                format!(
                    "overlap {} must be smaller than chunk_size {}",
                    rag.chunk_overlap, rag.chunk_size
                ),
            ));
        }

        if rag.n_results == 0 {
            return Err(ValidationError::out_of_range(
                "rag.n_results",
                "must be at least 1",
            ));
        }

        if let Some(threshold) = rag.distance_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(ValidationError::out_of_range(
                    "rag.distance_threshold",
                    "must be a non-negative distance",
                ));
            }
        }

        if rag.collection.trim().is_empty() {
            return Err(ValidationError::required("rag.collection"));
        }

        if rag.embedder == EmbedderKind::Hashing && rag.hashing_dimensions == 0 {
            return Err(ValidationError::out_of_range(
                "rag.hashing_dimensions",
                "must be at least 1",
            ));
        }

        Ok(())
    }

    fn validate_retry(&self, config: &GemlabConfig) -> Result<(), ValidationError> {
        let retry = &config.retry;

        if retry.exponential_base < 1.0 {
            return Err(ValidationError::out_of_range(
                "retry.exponential_base",
                "must be at least 1.0",
            ));
        }

        if !(0.0..=1.0).contains(&retry.jitter_factor) {
            return Err(ValidationError::out_of_range(
                "retry.jitter_factor",
                "must be within 0.0..=1.0",
            ));
        }

        if retry.initial_delay_ms > retry.max_delay_ms {
            return Err(ValidationError::incompatible(
                "retry.initial_delay_ms",
                "initial delay exceeds max_delay_ms",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ApiConfig;
    use crate::config::error::ValidationErrorKind;

    fn base() -> GemlabConfig {
        GemlabConfig::new(ApiConfig::new("AIzaSyD-test-key"))
    }

    #[test]
    fn test_default_config_passes() {
        assert!(ConfigValidator::new().validate(&base()).is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = base();
        config.rag.chunk_overlap = 400;
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field_path, "rag.chunk_overlap");
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut config = base();
        config.rag.distance_threshold = Some(-1.0);
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field_path, "rag.distance_threshold");
    }

    #[test]
    fn test_leftover_placeholder_rejected() {
        let config = GemlabConfig::new(ApiConfig::new("${GEMINI_API_KEY}"));
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::Incompatible { .. }));
    }

    #[test]
    fn test_bad_jitter_rejected() {
        let mut config = base();
        config.retry.jitter_factor = 1.5;
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field_path, "retry.jitter_factor");
    }
}
