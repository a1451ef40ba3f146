//! API keys that stay out of logs
//!
//! `Debug` and `Display` both print a fixed marker; the raw value is only
//! reachable through [`SecretString::expose_secret`] when building requests.

use serde::{Deserialize, Serialize};
use std::fmt;

const HIDDEN: &str = "[REDACTED]";

/// Key prefixes that are safe to show: Google API keys and Dify app keys
const KNOWN_PREFIXES: [&str; 2] = ["AIza", "app-"];

#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Enough of the key to tell two keys apart, e.g. `AIza...cdef`
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.is_empty() {
            return "[EMPTY]".to_string();
        }
        if chars.len() <= 8 {
            return HIDDEN.to_string();
        }

        let shown = if KNOWN_PREFIXES.iter().any(|p| self.0.starts_with(p)) {
            4
        } else {
            2
        };
        let head: String = chars[..shown].iter().collect();
        let tail: String = chars[chars.len() - shown..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(HIDDEN)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(HIDDEN)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
