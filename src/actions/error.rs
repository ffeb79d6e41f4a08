// ABOUTME: Errors raised while validating or running post-placement actions.
// ABOUTME: Cloneable so per-target outcomes can carry them.

use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error("unknown post-placement action: {0} (expected docker, k3s_airgap or generic_ssh)")]
    UnknownAction(String),

    #[error("option '{key}' for {action} must be a {expected}")]
    InvalidOption {
        action: &'static str,
        key: String,
        expected: &'static str,
    },

    #[error("option '{key}' is required for {action}")]
    MissingOption { action: &'static str, key: String },

    #[error("{action} failed with exit code {exit_code}: {stderr}")]
    RemoteFailed {
        action: &'static str,
        exit_code: u32,
        stderr: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}
