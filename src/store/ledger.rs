// ABOUTME: Transfer ledger recording upload progress per file, host and remote path.
// ABOUTME: Entries self-invalidate when the local file changes and expire by age.

use super::digest::short_key;
use super::document::JsonDocument;
use super::error::Result;
use super::stamp::FileStamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the ledger document inside the resume directory.
pub const LEDGER_FILE: &str = "ledger.json";

/// Default age after which `cleanup` purges entries.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub local_path: PathBuf,
    pub remote_host: String,
    pub remote_path: String,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub file_size: u64,
    pub local_mtime: DateTime<Utc>,
    pub percentage: f64,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn is_complete(&self) -> bool {
        self.total_bytes > 0 && self.transferred_bytes >= self.total_bytes
    }
}

/// Summary reported by `resume stats`.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub ledger_file: PathBuf,
    pub pending_transfers: usize,
    pub completed_transfers: usize,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug)]
pub struct TransferLedger {
    doc: JsonDocument<LedgerEntry>,
}

impl TransferLedger {
    pub fn open(resume_dir: &Path) -> Self {
        Self {
            doc: JsonDocument::load_or_empty(resume_dir.join(LEDGER_FILE)),
        }
    }

    pub fn key(local_path: &Path, remote_host: &str, remote_path: &str) -> String {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        short_key(&format!("{}:{}:{}", name, remote_host, remote_path))
    }

    /// Recorded progress, or `None` when nothing is recorded or the local
    /// file no longer matches what was recorded. Stale entries are deleted.
    pub fn get_progress(
        &mut self,
        local_path: &Path,
        remote_host: &str,
        remote_path: &str,
    ) -> Option<LedgerEntry> {
        let key = Self::key(local_path, remote_host, remote_path);
        let entry = self.doc.get(&key)?.clone();

        let stamp = match FileStamp::of(local_path) {
            Ok(stamp) => stamp,
            Err(e) => {
                tracing::warn!("Cannot stat {}: {}", local_path.display(), e);
                return None;
            }
        };

        let stale = if entry.file_size != stamp.size {
            tracing::warn!("File size changed, cannot resume: {}", local_path.display());
            true
        } else if entry.local_mtime != stamp.modified {
            tracing::warn!(
                "File modified since last transfer, cannot resume: {}",
                local_path.display()
            );
            true
        } else {
            false
        };

        if stale {
            if let Err(e) = self.doc.remove(&key) {
                tracing::warn!("Failed to drop stale ledger entry: {}", e);
            }
            return None;
        }

        Some(entry)
    }

    pub fn save_progress(
        &mut self,
        local_path: &Path,
        remote_host: &str,
        remote_path: &str,
        transferred_bytes: u64,
        total_bytes: u64,
    ) -> Result<()> {
        let stamp = FileStamp::of(local_path).map_err(|source| super::StoreError::Read {
            path: local_path.to_path_buf(),
            source,
        })?;

        let percentage = if total_bytes > 0 {
            (transferred_bytes as f64 / total_bytes as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        let entry = LedgerEntry {
            local_path: local_path.to_path_buf(),
            remote_host: remote_host.to_string(),
            remote_path: remote_path.to_string(),
            transferred_bytes,
            total_bytes,
            file_size: stamp.size,
            local_mtime: stamp.modified,
            percentage,
            updated_at: Utc::now(),
        };

        tracing::debug!(
            "Saved progress {}/{} bytes for {}",
            transferred_bytes,
            total_bytes,
            remote_host
        );
        self.doc
            .insert(Self::key(local_path, remote_host, remote_path), entry)
    }

    pub fn clear_progress(
        &mut self,
        local_path: &Path,
        remote_host: &str,
        remote_path: &str,
    ) -> Result<()> {
        self.doc
            .remove(&Self::key(local_path, remote_host, remote_path))
            .map(|_| ())
    }

    /// Purge entries not updated within `max_age`.
    pub fn cleanup(&mut self, max_age: Duration) -> Result<usize> {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let removed = self
            .doc
            .remove_where(|entry| now.signed_duration_since(entry.updated_at) > max_age)?;
        if removed > 0 {
            tracing::info!("Removed {} expired ledger entries", removed);
        }
        Ok(removed)
    }

    pub fn stats(&self) -> LedgerStats {
        let entries: Vec<LedgerEntry> = self.doc.entries().values().cloned().collect();
        let completed = entries.iter().filter(|e| e.is_complete()).count();
        LedgerStats {
            ledger_file: self.doc.path().to_path_buf(),
            pending_transfers: entries.len() - completed,
            completed_transfers: completed,
            entries,
        }
    }
}
