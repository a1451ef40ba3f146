//! Environment variable interpolation for configuration

use super::error::ConfigError;
use super::schema::GemlabConfig;
use super::secrets::SecretString;
use regex::Regex;
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var pattern is a valid regex")
});

/// Whether a value carries a `${VAR}` placeholder
pub(crate) fn has_placeholder(value: &str) -> bool {
    ENV_VAR_PATTERN.is_match(value)
}

/// Interpolate environment variables in a configuration string
///
/// Every `${VAR}` occurrence is replaced; the first unset variable is
/// reported as [`ConfigError::EnvVarNotFound`].
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut missing: Option<String> = None;

    let result = ENV_VAR_PATTERN.replace_all(content, |caps: &regex::Captures<'_>| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                if missing.is_none() {
                    missing = Some(var_name.to_string());
                }
                String::new()
            }
        }
    });

    if let Some(var) = missing {
        return Err(ConfigError::EnvVarNotFound { var });
    }

    Ok(result.into_owned())
}

/// Interpolate the secret-bearing fields of an already parsed configuration
///
/// Covers configs built in code or loaded from a source that skipped the
/// textual pass.
pub fn interpolate_config_env_vars(config: &mut GemlabConfig) -> Result<(), ConfigError> {
    if has_placeholder(config.api.api_key.expose_secret()) {
        let value = interpolate_env_vars(config.api.api_key.expose_secret())?;
        config.api.api_key = SecretString::new(value);
    }

    if has_placeholder(&config.api.base_url) {
        config.api.base_url = interpolate_env_vars(&config.api.base_url)?;
    }

    if let Some(dify) = config.dify.as_mut() {
        if has_placeholder(dify.api_key.expose_secret()) {
            let value = interpolate_env_vars(dify.api_key.expose_secret())?;
            dify.api_key = SecretString::new(value);
        }
        if has_placeholder(&dify.base_url) {
            dify.base_url = interpolate_env_vars(&dify.base_url)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ApiConfig;

    #[test]
    fn test_interpolate_env_vars() {
        env::set_var("GEMLAB_TEST_VAR", "test_value");

        let content = "api_key: ${GEMLAB_TEST_VAR}";
        let result = interpolate_env_vars(content).unwrap();
        assert_eq!(result, "api_key: test_value");

        env::remove_var("GEMLAB_TEST_VAR");
    }

    #[test]
    fn test_missing_env_var() {
        let content = "api_key: ${GEMLAB_MISSING_VAR}";
        let result = interpolate_env_vars(content);

        if let Err(ConfigError::EnvVarNotFound { var }) = result {
            assert_eq!(var, "GEMLAB_MISSING_VAR");
        } else {
            panic!("Expected EnvVarNotFound error");
        }
    }

    #[test]
    fn test_multiple_env_vars() {
        env::set_var("GEMLAB_VAR1", "value1");
        env::set_var("GEMLAB_VAR2", "value2");

        let content = "key1: ${GEMLAB_VAR1}, key2: ${GEMLAB_VAR2}, again: ${GEMLAB_VAR1}";
        let result = interpolate_env_vars(content).unwrap();
        assert_eq!(result, "key1: value1, key2: value2, again: value1");

        env::remove_var("GEMLAB_VAR1");
        env::remove_var("GEMLAB_VAR2");
    }

    #[test]
    fn test_lowercase_is_not_a_placeholder() {
        let content = "path: ${not_a_var}";
        assert_eq!(interpolate_env_vars(content).unwrap(), content);
    }

    #[test]
    fn test_interpolate_config_api_key() {
        env::set_var("GEMLAB_CFG_KEY", "AIza-from-env");
        let mut config = GemlabConfig::new(ApiConfig::new("${GEMLAB_CFG_KEY}"));

        interpolate_config_env_vars(&mut config).unwrap();
        assert_eq!(config.api.api_key.expose_secret(), "AIza-from-env");

        env::remove_var("GEMLAB_CFG_KEY");
    }
}
