// ABOUTME: A key-to-record map persisted as one JSON document.
// ABOUTME: Loaded whole at startup and rewritten whole after every mutation.

use super::error::{Result, StoreError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct JsonDocument<V> {
    path: PathBuf,
    entries: BTreeMap<String, V>,
}

impl<V: Serialize + DeserializeOwned> JsonDocument<V> {
    /// Load the document at `path`. A missing file is an empty store; an
    /// unreadable or corrupt one is reported so the caller can start fresh.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        Ok(Self { path, entries })
    }

    /// Load, falling back to an empty document on any read error.
    pub fn load_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("{}, starting with an empty store", e);
                Self {
                    path,
                    entries: BTreeMap::new(),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> &BTreeMap<String, V> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, key: String, value: V) -> Result<()> {
        self.entries.insert(key, value);
        self.persist()
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<V>> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Drop every entry matching `pred`, returning how many were removed.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&V) -> bool) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|_, v| !pred(v));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.persist()
    }

    /// Rewrite the whole document via a sibling temp file and rename.
    fn persist(&self) -> Result<()> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;

        tracing::debug!("Saved {} entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }
}
