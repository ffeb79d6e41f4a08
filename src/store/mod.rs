// ABOUTME: Local persistent state: the archive content cache and the transfer ledger.
// ABOUTME: Each store is one JSON document of key-to-record entries.

mod cache;
mod digest;
mod document;
mod error;
mod ledger;
mod stamp;

pub use cache::{CACHE_METADATA_FILE, CacheEntry, CacheStats, ContentCache, Fingerprint};
pub use digest::{HASH_CHUNK_SIZE, file_sha256, file_sha256_blocking, short_key};
pub use document::JsonDocument;
pub use error::{Result, StoreError};
pub use ledger::{DEFAULT_MAX_AGE, LEDGER_FILE, LedgerEntry, LedgerStats, TransferLedger};
pub use stamp::FileStamp;

use std::path::{Path, PathBuf};

/// Default state directory name under the user's home.
const STATE_DIR_NAME: &str = ".outrider";

/// Locations of the persistent stores.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/.outrider`, or `./.outrider` when no home directory is known.
    pub fn default_location() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(STATE_DIR_NAME))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn resume_dir(&self) -> PathBuf {
        self.root.join("resume")
    }

    pub fn open_cache(&self) -> ContentCache {
        ContentCache::open(&self.cache_dir())
    }

    pub fn open_ledger(&self) -> TransferLedger {
        TransferLedger::open(&self.resume_dir())
    }
}
