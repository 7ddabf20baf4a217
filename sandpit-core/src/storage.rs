//! Key/value storage backing persisted editor state.
//!
//! Mirrors the browser storage surface: string keys, string values, and
//! every operation may fail.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage file is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage is unavailable")]
    Unavailable,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// String key/value store
pub trait Storage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()>;
}

/// In-process storage, lost on exit
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage kept as a single JSON object on disk
///
/// Every write is a read-modify-write of the whole file, so a value written
/// by another process between two writes is kept. A file that no longer
/// parses is replaced on the next write rather than blocking it. Writes go
/// through a sibling temp file and a rename, so readers never see half a file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> StorageResult<Map<String, Value>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Current contents for a write; unreadable JSON starts over empty
    fn read_for_write(&self) -> StorageResult<Map<String, Value>> {
        match self.read_all() {
            Err(StorageError::Json(e)) => {
                tracing::warn!(
                    "State file {} is corrupt, starting fresh: {}",
                    self.path.display(),
                    e
                );
                Ok(Map::new())
            }
            other => other,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_all(&self, items: &Map<String, Value>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let contents = serde_json::to_string_pretty(items)?;
        let temp = self.temp_path();
        fs::write(&temp, contents).map_err(|source| StorageError::Io {
            path: temp.clone(),
            source,
        })?;
        fs::rename(&temp, &self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let items = self.read_all()?;
        Ok(items.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
    }

    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let mut items = self.read_for_write()?;
        items.insert(key.to_string(), Value::String(value.to_string()));
        self.write_all(&items)
    }
}
