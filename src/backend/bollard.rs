// ABOUTME: Bollard-based artifact backend for the local Docker or Podman daemon.
// ABOUTME: Pulls missing images, exports them to one archive, and imports archives.

use super::detection::{RuntimeInfo, RuntimeType};
use super::error::{
    BackendError, ConnectSnafu, ExportSnafu, ImportSnafu, InspectSnafu, PullSnafu,
    ReadArchiveSnafu, WriteArchiveSnafu,
};
use super::ArtifactBackend;
use crate::types::ImageName;
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{CreateImageOptions, ImportImageOptions};
use bytes::Bytes;
use futures::StreamExt;
use snafu::ResultExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Client timeout in seconds; exports of large image sets are slow.
const CLIENT_TIMEOUT_SECS: u64 = 600;
const IMPORT_CHUNK_SIZE: usize = 64 * 1024;

pub struct BollardBackend {
    client: Docker,
    runtime_type: RuntimeType,
}

impl std::fmt::Debug for BollardBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BollardBackend")
            .field("runtime_type", &self.runtime_type)
            .finish()
    }
}

impl BollardBackend {
    /// Connect to a runtime found by `detect_local()`.
    pub fn connect(info: &RuntimeInfo) -> Result<Self, BackendError> {
        let client = Docker::connect_with_unix(
            &info.socket_path,
            CLIENT_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )
        .context(ConnectSnafu {
            socket: info.socket_path.clone(),
        })?;
        tracing::debug!("Using {} at {}", info.runtime_type, info.socket_path);
        Ok(Self {
            client,
            runtime_type: info.runtime_type,
        })
    }

    /// Stream the exported images into `partial`, returning the bytes written.
    async fn export_to(&self, names: &[&str], partial: &Path) -> Result<u64, BackendError> {
        let mut file = tokio::fs::File::create(partial)
            .await
            .context(WriteArchiveSnafu { path: partial })?;

        let mut written = 0u64;
        let mut stream = self.client.export_images(names);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context(ExportSnafu)?;
            file.write_all(&chunk)
                .await
                .context(WriteArchiveSnafu { path: partial })?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .context(WriteArchiveSnafu { path: partial })?;
        Ok(written)
    }

    async fn image_exists(&self, image: &str) -> Result<bool, BackendError> {
        match self.client.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(source) => Err(BackendError::Inspect {
                image: image.to_string(),
                source,
            }),
        }
    }
}

/// Remove a half-written archive, logging instead of failing.
async fn discard_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove {}: {}", partial.display(), e),
    }
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

#[async_trait]
impl ArtifactBackend for BollardBackend {
    async fn pull(&self, image: &ImageName) -> Result<(), BackendError> {
        let name = image.as_str();
        if self.image_exists(name).await? {
            tracing::info!("Image {} already present locally", name);
            return Ok(());
        }

        tracing::info!("Pulling {}", name);
        let opts = CreateImageOptions {
            from_image: Some(name.to_string()),
            ..Default::default()
        };

        // Pull returns a stream of progress updates - consume it
        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            result.context(PullSnafu { image: name })?;
        }
        Ok(())
    }

    async fn package(&self, images: &[ImageName], output: &Path) -> Result<u64, BackendError> {
        let names: Vec<&str> = images.iter().map(ImageName::as_str).collect();
        let partial = partial_path(output);

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context(WriteArchiveSnafu { path: parent })?;
        }

        let written = match self.export_to(&names, &partial).await {
            Ok(written) => written,
            Err(e) => {
                discard_partial(&partial).await;
                return Err(e);
            }
        };

        if let Err(source) = tokio::fs::rename(&partial, output).await {
            discard_partial(&partial).await;
            return Err(BackendError::WriteArchive {
                path: output.to_path_buf(),
                source,
            });
        }

        tracing::info!("Packaged {} image(s) into {} ({} bytes)", names.len(), output.display(), written);
        Ok(written)
    }

    async fn unpackage(&self, archive: &Path) -> Result<(), BackendError> {
        let file = tokio::fs::File::open(archive)
            .await
            .context(ReadArchiveSnafu { path: archive })?;

        let source = archive.to_path_buf();
        let body = futures::stream::unfold(Some(file), move |state| {
            let source = source.clone();
            async move {
                let mut file = state?;
                let mut buf = vec![0u8; IMPORT_CHUNK_SIZE];
                match file.read(&mut buf).await {
                    Ok(0) => None,
                    Ok(n) => {
                        buf.truncate(n);
                        Some((Bytes::from(buf), Some(file)))
                    }
                    Err(e) => {
                        tracing::error!("Failed reading {}: {}", source.display(), e);
                        None
                    }
                }
            }
        });

        let opts = ImportImageOptions {
            quiet: true,
            ..Default::default()
        };
        let mut progress = self.client.import_image_stream(opts, body.map(Ok::<Bytes, std::io::Error>), None);
        while let Some(result) = progress.next().await {
            let info = result.context(ImportSnafu { path: archive })?;
            if let Some(stream) = info.stream {
                tracing::debug!("{}", stream.trim());
            }
        }

        tracing::info!("Imported {}", archive.display());
        Ok(())
    }
}
