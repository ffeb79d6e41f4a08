// ABOUTME: The remote-session seam: what the transport needs from a connection, and how one is opened.
// ABOUTME: SSH sessions implement it for real runs; tests supply their own connectors.

use crate::config::Target;
use crate::ssh::{self, CommandOutput, ProgressFn, Session, SessionConfig};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// An authenticated connection to one target.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput>;

    async fn path_exists(&self, path: &str) -> ssh::Result<bool>;

    /// Write a local file to `remote_path`. One call is one write operation.
    async fn write_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        progress: Option<&ProgressFn<'_>>,
    ) -> ssh::Result<u64>;

    async fn close(&self) -> ssh::Result<()>;
}

#[async_trait]
impl RemoteSession for Session {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput> {
        Session::exec(self, command).await
    }

    async fn path_exists(&self, path: &str) -> ssh::Result<bool> {
        Session::path_exists(self, path).await
    }

    async fn write_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        progress: Option<&ProgressFn<'_>>,
    ) -> ssh::Result<u64> {
        Session::write_file(self, local_path, remote_path, progress).await
    }

    async fn close(&self) -> ssh::Result<()> {
        self.disconnect().await
    }
}

/// Opens sessions for targets.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &Target) -> ssh::Result<Arc<dyn RemoteSession>>;
}

/// Connects over SSH using each target's resolved address and credentials.
#[derive(Debug, Clone)]
pub struct SshConnector {
    known_hosts_path: Option<PathBuf>,
    command_timeout: Duration,
}

impl SshConnector {
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            known_hosts_path: None,
            command_timeout,
        }
    }

    pub fn known_hosts_path(mut self, path: Option<PathBuf>) -> Self {
        self.known_hosts_path = path;
        self
    }

    pub fn session_config(&self, target: &Target) -> SessionConfig {
        let mut config = SessionConfig::new(&target.hostname, &target.user)
            .port(target.port)
            .credentials(target.auth.candidates())
            .host_key_policy(target.host_key_policy)
            .command_timeout(self.command_timeout);
        if let Some(path) = &self.known_hosts_path {
            config = config.known_hosts_path(path);
        }
        config
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, target: &Target) -> ssh::Result<Arc<dyn RemoteSession>> {
        let session = Session::connect(self.session_config(target)).await?;
        tracing::info!("Connected to {}", target.name);
        Ok(Arc::new(session))
    }
}
