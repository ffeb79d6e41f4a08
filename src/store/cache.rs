// ABOUTME: Content cache for packaged archives with SHA-256 integrity checks.
// ABOUTME: Lets the packaging stage skip work when the archive on disk is still valid.

use super::digest::{file_sha256, short_key};
use super::document::JsonDocument;
use super::error::{Result, StoreError};
use super::stamp::FileStamp;
use crate::types::ImageName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// File name of the cache metadata document inside the cache directory.
pub const CACHE_METADATA_FILE: &str = "metadata.json";

/// What was recorded about an archive when it was last packaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file_path: PathBuf,
    pub sha256: String,
    pub mtime: DateTime<Utc>,
    pub file_size: u64,
    pub images: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Summary reported by `cache stats`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub cache_file: PathBuf,
    pub num_entries: usize,
    pub total_size_bytes: u64,
    pub entries: Vec<CacheEntry>,
}

/// Digest and stamp of an archive, both read from the file itself.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    path: PathBuf,
    sha256: String,
    stamp: FileStamp,
}

impl Fingerprint {
    pub fn of(path: &Path) -> Result<Self> {
        let read_err = |source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        };
        let stamp = FileStamp::of(path).map_err(read_err)?;
        let sha256 = file_sha256(path).map_err(read_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            sha256,
            stamp,
        })
    }

    /// [`Fingerprint::of`] on the blocking pool.
    pub async fn of_blocking(path: &Path) -> Result<Self> {
        let owned = path.to_path_buf();
        match tokio::task::spawn_blocking(move || Self::of(&owned)).await {
            Ok(result) => result,
            Err(e) => Err(StoreError::Read {
                path: path.to_path_buf(),
                source: e.into(),
            }),
        }
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

#[derive(Debug)]
pub struct ContentCache {
    doc: JsonDocument<CacheEntry>,
}

impl ContentCache {
    /// Open the cache stored under `cache_dir`. A corrupt document is
    /// discarded with a warning.
    pub fn open(cache_dir: &Path) -> Self {
        Self {
            doc: JsonDocument::load_or_empty(cache_dir.join(CACHE_METADATA_FILE)),
        }
    }

    /// Stable key for an image set packaged to `output_path`. Only the file
    /// name of the output participates so the key survives relative paths.
    pub fn cache_key(images: &[ImageName], output_path: &Path) -> String {
        let key_data = serde_json::json!({
            "images": sorted_names(images),
            "output_path": basename(output_path),
        });
        short_key(&key_data.to_string())
    }

    /// True only if the file exists, an entry for exactly this image set is
    /// recorded, the modification time is unchanged, and re-hashing the file
    /// reproduces the recorded digest. Every failure reads as a miss.
    pub fn is_valid(&self, file_path: &Path, images: &[ImageName]) -> bool {
        match self.recorded_digest(file_path, images) {
            Some(expected) => Self::confirm(file_path, &expected, file_sha256(file_path)),
            None => false,
        }
    }

    /// The digest recorded for `file_path` when every check short of
    /// re-hashing passes. Callers hash the file and [`confirm`](Self::confirm).
    pub fn recorded_digest(&self, file_path: &Path, images: &[ImageName]) -> Option<String> {
        let Ok(stamp) = FileStamp::of(file_path) else {
            tracing::debug!("Cache file not found: {}", file_path.display());
            return None;
        };

        let key = Self::cache_key(images, file_path);
        let Some(entry) = self.doc.get(&key) else {
            tracing::debug!("No cache entry for {}", file_path.display());
            return None;
        };

        if entry.sha256.is_empty() {
            return None;
        }

        if entry.mtime != stamp.modified || entry.file_size != stamp.size {
            tracing::debug!("File modified since cached: {}", file_path.display());
            return None;
        }

        Some(entry.sha256.clone())
    }

    /// Compare a freshly computed digest against the recorded one.
    pub fn confirm(file_path: &Path, expected: &str, actual: io::Result<String>) -> bool {
        match actual {
            Ok(digest) if digest == expected => {
                tracing::info!("Cache valid for {}", file_path.display());
                true
            }
            Ok(_) => {
                tracing::warn!("SHA-256 mismatch for {}", file_path.display());
                false
            }
            Err(e) => {
                tracing::warn!("Failed to hash {}: {}", file_path.display(), e);
                false
            }
        }
    }

    /// Record the current state of `file_path` for `images`. The digest is
    /// always recomputed from the bytes on disk.
    pub fn update(&mut self, file_path: &Path, images: &[ImageName]) -> Result<()> {
        self.record(Fingerprint::of(file_path)?, images)
    }

    /// Record a fingerprint taken from the archive for `images`.
    pub fn record(&mut self, fingerprint: Fingerprint, images: &[ImageName]) -> Result<()> {
        let Fingerprint {
            path,
            sha256,
            stamp,
        } = fingerprint;
        let key = Self::cache_key(images, &path);

        tracing::info!(
            "Updated cache for {} (sha256: {}...)",
            path.display(),
            sha256.get(..16).unwrap_or(&sha256)
        );
        let entry = CacheEntry {
            file_path: path,
            sha256,
            mtime: stamp.modified,
            file_size: stamp.size,
            images: sorted_names(images),
            timestamp: Utc::now(),
        };
        self.doc.insert(key, entry)
    }

    /// Clear entries for one archive path, or everything when `None`.
    pub fn clear(&mut self, file_path: Option<&Path>) -> Result<usize> {
        match file_path {
            None => {
                let count = self.doc.len();
                self.doc.clear()?;
                tracing::info!("Cleared entire cache");
                Ok(count)
            }
            Some(path) => {
                let removed = self.doc.remove_where(|entry| entry.file_path == path)?;
                tracing::info!("Cleared {} cache entries for {}", removed, path.display());
                Ok(removed)
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cache_file: self.doc.path().to_path_buf(),
            num_entries: self.doc.len(),
            total_size_bytes: self.doc.entries().values().map(|e| e.file_size).sum(),
            entries: self.doc.entries().values().cloned().collect(),
        }
    }
}

fn sorted_names(images: &[ImageName]) -> Vec<String> {
    let mut names: Vec<String> = images.iter().map(ToString::to_string).collect();
    names.sort();
    names.dedup();
    names
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
