// ABOUTME: Application-wide error types for outrider.
// ABOUTME: Uses thiserror for ergonomic error handling.

use crate::actions::ActionError;
use crate::backend::BackendError;
use crate::store::StoreError;
use crate::types::ImageNameError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("required variable {name} is not set: {message}")]
    MissingEnvVar { name: String, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid image name: {0}")]
    InvalidImage(#[from] ImageNameError),

    #[error("invalid post-placement action for {target}: {source}")]
    InvalidAction { target: String, source: ActionError },

    #[error(transparent)]
    Ssh(#[from] crate::ssh::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
