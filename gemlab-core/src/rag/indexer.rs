//! Loading Markdown notes and JSON diaries into the vector store

use super::splitter::{check_window, split_text, SplitError};
use super::store::{Metadata, VectorStore};
use super::RagError;
use crate::config::RagSettings;
use crate::persistence::StoreError;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Category tag of technical document chunks
pub const TECH_CATEGORY: &str = "tech";
/// Category tag of diary entries
pub const DIARY_CATEGORY: &str = "diary";

/// What one indexing pass stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub files: usize,
    pub chunks: usize,
    pub skipped: usize,
}

impl std::ops::AddAssign for IndexStats {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.chunks += other.chunks;
        self.skipped += other.skipped;
    }
}

/// Turns files into tagged records
#[derive(Debug, Clone)]
pub struct Indexer {
    chunk_size: usize,
    chunk_overlap: usize,
    tech_author: String,
    diary_subject: String,
}

impl Indexer {
    pub fn new(settings: &RagSettings) -> Result<Self, SplitError> {
        check_window(settings.chunk_size, settings.chunk_overlap)?;
        Ok(Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            tech_author: settings.tech_author.clone(),
            diary_subject: settings.diary_subject.clone(),
        })
    }

    /// Chunk every `*.md` file in `dir` with `category = tech`
    pub async fn index_tech_docs(
        &self,
        store: &mut VectorStore,
        dir: &Path,
    ) -> Result<IndexStats, RagError> {
        let files = list_files(dir, "md")?;
        info!(count = files.len(), dir = %dir.display(), "Technical documents found");

        let mut stats = IndexStats::default();
        for path in files {
            let filename = file_name(&path);
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %filename, error = %e, "Skipping unreadable document");
                    stats.skipped += 1;
                    continue;
                }
            };

            let chunks = split_text(&content, self.chunk_size, self.chunk_overlap)?;
            if chunks.is_empty() {
                stats.skipped += 1;
                continue;
            }

            let ids = (0..chunks.len())
                .map(|i| format!("tech_{}_{}", filename, i))
                .collect();
            let metadatas = (0..chunks.len())
                .map(|i| {
                    to_metadata(json!({
                        "category": TECH_CATEGORY,
                        "author": self.tech_author,
                        "source": filename,
                        "chunk_index": i,
                    }))
                })
                .collect();

            info!(file = %filename, chunks = chunks.len(), "Storing technical document");
            stats.chunks += store.upsert(ids, chunks, metadatas).await?;
            stats.files += 1;
        }

        Ok(stats)
    }

    /// Store each entry of every `*.json` array file in `dir` with `category = diary`
    ///
    /// Files that are not JSON arrays are skipped with a warning.
    pub async fn index_diary_logs(
        &self,
        store: &mut VectorStore,
        dir: &Path,
    ) -> Result<IndexStats, RagError> {
        let files = list_files(dir, "json")?;
        info!(count = files.len(), dir = %dir.display(), "Diary files found");

        let mut stats = IndexStats::default();
        for path in files {
            let filename = file_name(&path);
            let entries = match fs::read_to_string(&path)
                .ok()
                .and_then(|c| serde_json::from_str::<Value>(&c).ok())
            {
                Some(Value::Array(entries)) => entries,
                Some(_) => {
                    warn!(file = %filename, "Skipping diary file: not a JSON array");
                    stats.skipped += 1;
                    continue;
                }
                None => {
                    warn!(file = %filename, "Skipping diary file: JSON parse failed");
                    stats.skipped += 1;
                    continue;
                }
            };
            if entries.is_empty() {
                continue;
            }

            let documents: Vec<String> = entries.iter().map(render_diary_entry).collect();
            let ids = (0..documents.len())
                .map(|i| format!("diary_{}_{}", filename, i))
                .collect();
            let metadatas = (0..documents.len())
                .map(|_| {
                    to_metadata(json!({
                        "category": DIARY_CATEGORY,
                        "subject": self.diary_subject,
                        "source": filename,
                    }))
                })
                .collect();

            info!(file = %filename, entries = documents.len(), "Storing diary entries");
            stats.chunks += store.upsert(ids, documents, metadatas).await?;
            stats.files += 1;
        }

        Ok(stats)
    }

    /// Index both kinds of files found in `dir`
    pub async fn index_dir(&self, store: &mut VectorStore, dir: &Path) -> Result<IndexStats, RagError> {
        let mut stats = self.index_tech_docs(store, dir).await?;
        stats += self.index_diary_logs(store, dir).await?;
        Ok(stats)
    }
}

/// `时间: {timestamp}\n事件: {event}`, falling back to the whole entry as the event
pub fn render_diary_entry(entry: &Value) -> String {
    let timestamp = match entry.get("timestamp") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "未知".to_string(),
    };
    let event = match entry.get("event") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => entry.to_string(),
    };
    format!("时间: {}\n事件: {}", timestamp, event)
}

fn to_metadata(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map,
        _ => Metadata::new(),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, StoreError> {
    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        extension
    );
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(Result::ok).collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_diary_entry() {
        let entry = json!({"timestamp": "2026-01-06 08:00", "event": "胖墩墩吃了鸡胸肉"});
        assert_eq!(render_diary_entry(&entry), "时间: 2026-01-06 08:00\n事件: 胖墩墩吃了鸡胸肉");

        let bare = json!({"mood": "开心"});
        assert_eq!(render_diary_entry(&bare), "时间: 未知\n事件: {\"mood\":\"开心\"}");
    }

    #[test]
    fn test_indexer_rejects_bad_window() {
        let settings = RagSettings {
            chunk_overlap: 500,
            ..RagSettings::default()
        };
        assert!(Indexer::new(&settings).is_err());
    }
}
