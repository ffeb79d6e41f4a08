// ABOUTME: Size and modification-time snapshot of a local file.
// ABOUTME: Used as the cheap staleness pre-filter by the cache and ledger.

use chrono::{DateTime, Utc};
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl FileStamp {
    pub fn of(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            size: meta.len(),
            modified: DateTime::<Utc>::from(meta.modified()?),
        })
    }
}
