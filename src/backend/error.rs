// ABOUTME: Artifact backend error types with SNAFU pattern.
// ABOUTME: Each variant carries the image or path the runtime was working on.

use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("no container runtime found (checked {checked})"))]
    NoRuntimeFound { checked: String },

    #[snafu(display("failed to connect to runtime at {socket}: {source}"))]
    Connect {
        socket: String,
        source: bollard::errors::Error,
    },

    #[snafu(display("failed to inspect {image}: {source}"))]
    Inspect {
        image: String,
        source: bollard::errors::Error,
    },

    #[snafu(display("failed to pull {image}: {source}"))]
    Pull {
        image: String,
        source: bollard::errors::Error,
    },

    #[snafu(display("failed to export images: {source}"))]
    Export { source: bollard::errors::Error },

    #[snafu(display("failed to write archive {}: {source}", path.display()))]
    WriteArchive {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to read archive {}: {source}", path.display()))]
    ReadArchive {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to import {}: {source}", path.display()))]
    Import {
        path: PathBuf,
        source: bollard::errors::Error,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// No usable runtime socket on this machine.
    Unavailable,
    /// The runtime rejected or failed an operation.
    Runtime,
    /// Local archive I/O failed.
    Archive,
}

impl BackendError {
    pub fn kind(&self) -> BackendErrorKind {
        match self {
            BackendError::NoRuntimeFound { .. } | BackendError::Connect { .. } => {
                BackendErrorKind::Unavailable
            }
            BackendError::Inspect { .. }
            | BackendError::Pull { .. }
            | BackendError::Export { .. }
            | BackendError::Import { .. } => BackendErrorKind::Runtime,
            BackendError::WriteArchive { .. } | BackendError::ReadArchive { .. } => {
                BackendErrorKind::Archive
            }
        }
    }
}
