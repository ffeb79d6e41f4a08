// ABOUTME: Errors that abort a run before the fan-out stages.
// ABOUTME: Per-target failures are outcomes, not errors; see outcome.rs.

use crate::backend::BackendError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to acquire {image}: {source}")]
    Acquire {
        image: String,
        source: BackendError,
    },

    #[error("failed to package images into {}: {source}", path.display())]
    Package { path: PathBuf, source: BackendError },

    #[error("archive {} is unreadable: {source}", path.display())]
    ArchiveUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}
