//! Save store contract and implementations.
//!
//! The store is string-keyed, JSON-valued, with no transactions; the
//! engine layers its own defensive versioning on top. `MemoryStore`
//! backs tests and headless runs; `JsonFileStore` keeps one file per key
//! under a data directory and writes through a temp-file rename so a
//! crash never leaves a half-written record.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors surfaced by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error for save key {key:?}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error for save key {key:?}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// String-keyed durable storage for opaque JSON records.
pub trait SaveStore {
    fn save(&mut self, key: &str, value: &serde_json::Value) -> Result<(), StoreError>;
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;
}

/// Serialize and save a typed record.
pub fn save_record<T: Serialize>(
    store: &mut dyn SaveStore,
    key: &str,
    record: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(record).map_err(|source| StoreError::Serialize {
        key: key.to_string(),
        source,
    })?;
    store.save(key, &value)
}

/// Load and decode a typed record. A record that exists but no longer
/// decodes is treated as absent (logged), not as a hard failure: a stale
/// save must never abort a load.
pub fn load_record<T: DeserializeOwned>(
    store: &dyn SaveStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let Some(value) = store.load(key)? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(record) => Ok(Some(record)),
        Err(err) => {
            tracing::warn!(key, error = %err, "discarding undecodable save record");
            Ok(None)
        }
    }
}

/// In-memory store for tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, serde_json::Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }
}

impl SaveStore for MemoryStore {
    fn save(&mut self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        self.records.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a data directory.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default location under the platform data directory.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("runeward").join("saves"))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys may contain path separators ("buffs/42"); flatten to a
        // single safe filename.
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    fn io_err(key: &str, source: std::io::Error) -> StoreError {
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl SaveStore for JsonFileStore {
    fn save(&mut self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::io_err(key, e))?;

        let contents =
            serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
                key: key.to_string(),
                source,
            })?;

        // Write-then-rename so a crash mid-write can't corrupt the record.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(|e| Self::io_err(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| Self::io_err(key, e))?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Self::io_err(key, err)),
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(key, path = %path.display(), error = %err, "unreadable save file");
                Ok(None)
            }
        }
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Self::io_err(key, err)),
        }
    }
}
