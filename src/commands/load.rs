// ABOUTME: Load command implementation.
// ABOUTME: Imports an image archive into the local runtime, e.g. on an air-gapped host.

use outrider::backend::{self, ArtifactBackend, RuntimeConfig};
use outrider::error::Result;
use outrider::output::Output;
use std::path::Path;

pub async fn load(archive: &Path, socket: Option<String>, mut output: Output) -> Result<bool> {
    output.start_timer();
    let backend = backend::connect_local(&RuntimeConfig {
        runtime: None,
        socket,
    })?;

    output.progress(&format!("Loading {}...", archive.display()));
    backend.unpackage(archive).await?;
    output.success(&format!("Loaded {}", archive.display()));
    Ok(true)
}
