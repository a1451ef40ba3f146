//! Retrieval-augmented generation
//!
//! Documents are cut into overlapping character windows ([`split_text`]),
//! embedded into a [`VectorStore`] collection tagged by category, and
//! retrieved by [`RagPipeline`] to ground model answers.

mod indexer;
mod pipeline;
mod splitter;
mod store;

pub use indexer::{render_diary_entry, IndexStats, Indexer, DIARY_CATEGORY, TECH_CATEGORY};
pub use pipeline::{RagAnswer, RagPipeline, KNOWLEDGE_BASE_PROMPT, NO_MATERIAL_ANSWER};
pub use splitter::{check_window, split_text, SplitError};
pub use store::{Metadata, MetadataFilter, QueryHit, VectorStore};

use crate::persistence::StoreError;
use crate::providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Split(#[from] SplitError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
