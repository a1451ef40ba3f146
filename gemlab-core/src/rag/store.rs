//! In-process vector store with optional JSON persistence
//!
//! A single named collection of `(id, document, metadata, embedding)`
//! records. Queries rank by squared Euclidean distance, ascending, with an
//! optional metadata equality filter applied before ranking.

use crate::embedding::squared_l2;
use crate::persistence::{read_json, write_pretty_json, StoreError};
use crate::providers::Embedder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Free-form record metadata
pub type Metadata = Map<String, Value>;

/// Metadata predicate evaluated before ranking
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    Eq { key: String, value: Value },
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    /// `metadata[key] == value`
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Both this filter and `other`
    pub fn and(self, other: MetadataFilter) -> Self {
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq { key, value } => metadata.get(key) == Some(value),
            Self::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }
}

/// One ranked result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    /// Squared L2 distance to the query
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    document: String,
    #[serde(default)]
    metadata: Metadata,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    collection: String,
    embedder: String,
    records: Vec<StoredRecord>,
}

/// A named collection of embedded documents
pub struct VectorStore {
    collection: String,
    embedder: Arc<dyn Embedder>,
    records: Vec<StoredRecord>,
    index: HashMap<String, usize>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("collection", &self.collection)
            .field("embedder", &self.embedder.name())
            .field("count", &self.records.len())
            .field("path", &self.path)
            .finish()
    }
}

impl VectorStore {
    /// Empty in-memory collection
    pub fn new(collection: impl Into<String>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            collection: collection.into(),
            embedder,
            records: Vec::new(),
            index: HashMap::new(),
            path: None,
        }
    }

    /// Collection backed by `path`, loading it when the file exists
    pub fn open(
        path: impl Into<PathBuf>,
        collection: impl Into<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let mut store = Self::new(collection, embedder);

        if path.exists() {
            let value = read_json(&path)?;
            let file: StoreFile =
                serde_json::from_value(value).map_err(|e| StoreError::json(&path, e))?;

            if file.collection != store.collection {
                return Err(StoreError::CollectionMismatch {
                    expected: store.collection,
                    actual: file.collection,
                });
            }
            if file.embedder != store.embedder.name() {
                warn!(
                    stored = %file.embedder,
                    current = %store.embedder.name(),
                    "Store was built with a different embedder; distances may be meaningless"
                );
            }

            for record in file.records {
                store.insert(record);
            }
            info!(path = %path.display(), count = store.count(), "Vector store loaded");
        }

        store.path = Some(path);
        Ok(store)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    fn dimensions(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.len())
    }

    fn insert(&mut self, record: StoredRecord) {
        match self.index.get(&record.id) {
            Some(&i) => self.records[i] = record,
            None => {
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Embed and insert documents, replacing records with the same id
    pub async fn upsert(
        &mut self,
        ids: Vec<String>,
        documents: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> Result<usize, StoreError> {
        if ids.len() != documents.len() || ids.len() != metadatas.len() {
            return Err(StoreError::LengthMismatch {
                ids: ids.len(),
                documents: documents.len(),
                metadatas: metadatas.len(),
            });
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let embeddings = self.embedder.embed_batch(&documents).await?;
        if embeddings.len() != documents.len() {
            return Err(StoreError::LengthMismatch {
                ids: ids.len(),
                documents: embeddings.len(),
                metadatas: metadatas.len(),
            });
        }

        let expected = self
            .dimensions()
            .or_else(|| embeddings.first().map(Vec::len))
            .unwrap_or(0);
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        let count = ids.len();
        for (((id, document), metadata), embedding) in
            ids.into_iter().zip(documents).zip(metadatas).zip(embeddings)
        {
            self.insert(StoredRecord {
                id,
                document,
                metadata,
                embedding,
            });
        }

        debug!(collection = %self.collection, upserted = count, total = self.count(), "Upsert finished");
        Ok(count)
    }

    /// Nearest `n_results` records to `text`, closest first
    pub async fn query(
        &self,
        text: &str,
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>, StoreError> {
        if n_results == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(text).await?;
        if let Some(expected) = self.dimensions() {
            if query_vector.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
        }

        let mut scored: Vec<(f32, &StoredRecord)> = self
            .records
            .iter()
            .filter(|r| filter.is_none_or(|f| f.matches(&r.metadata)))
            .map(|r| (squared_l2(&query_vector, &r.embedding), r))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(n_results)
            .map(|(distance, r)| QueryHit {
                id: r.id.clone(),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
                distance,
            })
            .collect())
    }

    /// Write the collection to its backing file; in-memory stores do nothing
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            debug!(collection = %self.collection, "In-memory store, nothing to save");
            return Ok(());
        };

        let file = StoreFile {
            collection: self.collection.clone(),
            embedder: self.embedder.name().to_string(),
            records: self.records.clone(),
        };
        write_pretty_json(path, &file)?;
        info!(path = %path.display(), count = self.count(), "Vector store saved");
        Ok(())
    }
}
