// ABOUTME: SSH client module for remote host connections.
// ABOUTME: Ordered credential attempts, host key policy, exec and file streaming.

mod auth;
mod client;
mod error;
mod host_key;
mod quote;
mod ssh_config;

pub use auth::{Credential, DEFAULT_KEY_NAMES, default_key_paths};
pub use client::{CommandOutput, ProgressFn, Session, SessionConfig, UPLOAD_CHUNK_SIZE};
pub use error::{Error, Result};
pub use host_key::{HostKeyPolicy, HostKeyVerifier, Verdict};
pub use quote::shell_quote;
pub use ssh_config::{HostSettings, SshConfig, expand_home};
