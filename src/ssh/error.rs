// ABOUTME: SSH-specific error types.
// ABOUTME: Covers connection, authentication, host key, and remote I/O failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection to {host}:{port} failed: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("host key for {host}:{port} rejected ({reason})")]
    HostKeyRejected {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("authentication failed for {user}@{host}, tried: {}", .attempted.join(", "))]
    AuthenticationFailed {
        user: String,
        host: String,
        attempted: Vec<String>,
    },

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("command timed out after {0:?}")]
    CommandTimeout(std::time::Duration),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("remote write to {path} failed: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("invalid ssh config at {path}: {reason}")]
    SshConfig { path: PathBuf, reason: String },

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error happened before a session existed.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. }
                | Error::HostKeyRejected { .. }
                | Error::AuthenticationFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
