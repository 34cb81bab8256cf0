//! Directory-backed store for the persisted workflow state
//!
//! Each entry is one JSON file; writes go through a temporary file and a
//! rename so a crash never leaves a half-written entry behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("State storage I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error for entry {key}: {source}")]
    Serialization {
        key: StateKey,
        #[source]
        source: serde_json::Error,
    },
}

/// Named entries of the persisted state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKey {
    /// Current workflow step
    AppStep,
    /// Working result set (requirement or compliance rows)
    AnalysisResults,
    /// Rows answering injected condition targets
    ConditionResults,
}

impl StateKey {
    pub const ALL: [StateKey; 3] = [
        StateKey::AppStep,
        StateKey::AnalysisResults,
        StateKey::ConditionResults,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::AppStep => "appStep",
            StateKey::AnalysisResults => "analysisResults",
            StateKey::ConditionResults => "conditionResults",
        }
    }

    fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON entries stored under one directory
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Open the store, creating the directory when missing
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        tracing::debug!(dir = %dir.display(), "State store opened");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: StateKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read an entry; `Ok(None)` when it does not exist
    pub fn load<T: DeserializeOwned>(&self, key: StateKey) -> Result<Option<T>, StoreError> {
        let path = self.path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Serialization { key, source })
    }

    /// Write an entry atomically
    pub fn save<T: Serialize>(&self, key: StateKey, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_vec(value)
            .map_err(|source| StoreError::Serialization { key, source })?;

        let path = self.path(key);
        let tmp = self.dir.join(format!(".{}.tmp", key.file_name()));
        fs::write(&tmp, &json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(entry = %key, size_bytes = json.len(), "Persisted state entry");
        Ok(())
    }

    /// Delete an entry; deleting a missing entry is not an error
    pub fn remove(&self, key: StateKey) -> Result<(), StoreError> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(entry = %key, "Removed state entry");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Delete every entry
    pub fn clear(&self) -> Result<(), StoreError> {
        for key in StateKey::ALL {
            self.remove(key)?;
        }
        Ok(())
    }

    pub fn exists(&self, key: StateKey) -> bool {
        self.path(key).exists()
    }
}
