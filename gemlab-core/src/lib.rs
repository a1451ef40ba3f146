//! Gemlab Core Library
//!
//! Building blocks for applications on the Gemini API: multi-turn chat,
//! schema-constrained JSON output, a generator/auditor/refactorer critique
//! loop, image analysis, embeddings, retrieval-augmented answering and a
//! tool-calling agent.

pub mod agent;
pub mod chat;
pub mod config;
pub mod critique;
pub mod embedding;
pub mod error;
pub mod http;
pub mod persistence;
pub mod protocol;
pub mod providers;
pub mod rag;
pub mod structured;
pub mod vision;

pub use error::{GemlabError, Result};

/// Returns the version of the Gemlab Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
