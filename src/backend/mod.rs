// ABOUTME: Artifact backend: pulling images and packing them into, or unpacking them from, one archive.
// ABOUTME: Talks to the local Docker or Podman daemon through bollard.

mod bollard;
mod detection;
mod error;

pub use self::bollard::BollardBackend;
pub use detection::{RuntimeConfig, RuntimeInfo, RuntimeType, detect_local};
pub use error::{BackendError, BackendErrorKind};

use crate::types::ImageName;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait ArtifactBackend: Send + Sync {
    /// Make `image` available locally, pulling only when missing.
    async fn pull(&self, image: &ImageName) -> Result<(), BackendError>;

    /// Write every image into one archive at `output`. Returns its size.
    async fn package(&self, images: &[ImageName], output: &Path) -> Result<u64, BackendError>;

    /// Load every image in `archive` into the runtime.
    async fn unpackage(&self, archive: &Path) -> Result<(), BackendError>;
}

/// Detect the local runtime and connect to it.
pub fn connect_local(config: &RuntimeConfig) -> Result<BollardBackend, BackendError> {
    BollardBackend::connect(&detect_local(config)?)
}
