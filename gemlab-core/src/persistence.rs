//! Timestamped JSON records on disk
//!
//! Each save writes a fresh `{prefix}_{YYYYMMDDHHMMSS}.json` file, so a
//! directory doubles as an append-only log that later runs can reload.

use crate::providers::ProviderError;
use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised by the JSON archive and the vector store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("JSON error in '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Batch length mismatch: {ids} ids, {documents} documents, {metadatas} metadatas")]
    LengthMismatch {
        ids: usize,
        documents: usize,
        metadatas: usize,
    },

    #[error("Vector dimension mismatch: store holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Collection mismatch: expected '{expected}', file holds '{actual}'")]
    CollectionMismatch { expected: String, actual: String },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.display().to_string(),
            source,
        }
    }
}

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const TIMESTAMP_LEN: usize = 14;

/// Write a value as 4-space indented JSON, keeping non-ASCII text readable
pub fn write_pretty_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| StoreError::json(path, e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    fs::write(path, buf).map_err(|e| StoreError::io(path, e))
}

/// Read and parse one JSON file
pub fn read_json(path: &Path) -> Result<Value, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| StoreError::json(path, e))
}

/// Directory of timestamped JSON records
#[derive(Debug, Clone)]
pub struct JsonArchive {
    dir: PathBuf,
}

impl JsonArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `value` as `{prefix}_{timestamp}.json` and return the path
    ///
    /// A second save within the same second gets a `_N` suffix instead of
    /// overwriting the first.
    pub fn save<T: Serialize + ?Sized>(&self, prefix: &str, value: &T) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let mut path = self.dir.join(format!("{}_{}.json", prefix, timestamp));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}_{}_{}.json", prefix, timestamp, n));
            n += 1;
        }

        write_pretty_json(&path, value)?;
        info!(path = %path.display(), "Record saved");
        Ok(path)
    }

    /// Newest record for `prefix` by modification time, then by name
    pub fn load_latest(&self, prefix: &str) -> Result<Option<(Value, PathBuf)>, StoreError> {
        let latest = self
            .matching_files(prefix)?
            .into_iter()
            .map(|(key, path)| {
                let modified = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, key, path)
            })
            .max();

        let Some((_, _, latest)) = latest else {
            return Ok(None);
        };

        let value = read_json(&latest)?;
        Ok(Some((value, latest)))
    }

    /// Every readable record for `prefix`, oldest first
    ///
    /// Files that fail to parse are skipped with a warning.
    pub fn load_all(&self, prefix: &str) -> Result<Vec<(Value, PathBuf)>, StoreError> {
        let mut files = self.matching_files(prefix)?;
        files.sort();

        let mut records = Vec::with_capacity(files.len());
        for (_, path) in files {
            match read_json(&path) {
                Ok(value) => records.push((value, path)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }
        Ok(records)
    }

    fn matching_files(&self, prefix: &str) -> Result<Vec<(RecordKey, PathBuf)>, StoreError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = format!(
            "{}/{}_*.json",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            glob::Pattern::escape(prefix)
        );

        let stem_prefix = format!("{}_", prefix);
        let files = glob::glob(&pattern)?
            .filter_map(Result::ok)
            .filter_map(|path| {
                let key = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.strip_prefix(&stem_prefix))
                    .and_then(record_key)?;
                Some((key, path))
            })
            .collect();
        Ok(files)
    }
}

/// Save time and same-second counter; orders records numerically
type RecordKey = (u64, u32);

/// `20260106150001` or `20260106150001_2`
fn record_key(rest: &str) -> Option<RecordKey> {
    let (stamp, suffix) = match rest.split_once('_') {
        Some((stamp, suffix)) => (stamp, Some(suffix)),
        None => (rest, None),
    };
    if stamp.len() != TIMESTAMP_LEN || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let counter = match suffix {
        None => 0,
        Some(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok()?,
        Some(_) => return None,
    };
    Some((stamp.parse().ok()?, counter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key() {
        assert_eq!(record_key("20260106150001"), Some((20260106150001, 0)));
        assert_eq!(record_key("20260106150001_2"), Some((20260106150001, 2)));
        assert_eq!(record_key("tasks_db_20260106150001"), None);
        assert_eq!(record_key("2026"), None);
        assert_eq!(record_key("20260106150001_"), None);
        assert!(record_key("20260106150001_10") > record_key("20260106150001_2"));
    }

    #[test]
    fn test_same_second_records_order_numerically() {
        let dir = tempfile::TempDir::new().unwrap();
        let archive = JsonArchive::new(dir.path());

        let names = ["pet_20260106150001_10", "pet_20260106150001_2", "pet_20260106150001"];
        let stamp = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_767_682_801);
        for (i, name) in names.iter().enumerate() {
            let path = dir.path().join(format!("{}.json", name));
            fs::write(&path, serde_json::json!({"n": i}).to_string()).unwrap();
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(stamp)
                .unwrap();
        }

        let order: Vec<String> = archive
            .load_all("pet")
            .unwrap()
            .iter()
            .map(|(_, p)| p.file_stem().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            order,
            vec!["pet_20260106150001", "pet_20260106150001_2", "pet_20260106150001_10"]
        );

        let (value, path) = archive.load_latest("pet").unwrap().unwrap();
        assert_eq!(value["n"], 0);
        assert!(path.ends_with("pet_20260106150001_10.json"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let archive = JsonArchive::new(dir.path().join("rst"));
        assert!(archive.load_latest("pet").unwrap().is_none());

        let first = archive.save("pet", &serde_json::json!({"mood": "开心"})).unwrap();
        let second = archive.save("pet", &serde_json::json!({"mood": "困"})).unwrap();
        archive
            .save("pet_status_log", &serde_json::json!({"other": true}))
            .unwrap();
        assert_ne!(first, second);

        let raw = fs::read_to_string(&first).unwrap();
        assert_eq!(raw, "{\n    \"mood\": \"开心\"\n}");

        let all = archive.load_all("pet").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0["mood"], "开心");
        assert_eq!(all[1].0["mood"], "困");
    }

    #[test]
    fn test_unreadable_records_are_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let archive = JsonArchive::new(dir.path());
        archive.save("tasks_db", &serde_json::json!([1, 2])).unwrap();
        fs::write(dir.path().join("tasks_db_20000101000000.json"), "{ nope").unwrap();

        let all = archive.load_all("tasks_db").unwrap();
        assert_eq!(all.len(), 1);
        assert!(read_json(&dir.path().join("tasks_db_20000101000000.json")).is_err());
    }
}
