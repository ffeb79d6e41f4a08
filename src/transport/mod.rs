// ABOUTME: Transport operations over managed sessions: upload, execute, existence check.
// ABOUTME: Upload reports failure as `false`; execute and exists surface typed errors.

mod manager;
mod session;

pub use manager::SessionManager;
pub use session::{Connector, RemoteSession, SshConnector};

use crate::config::Target;
use crate::diagnostics::Diagnostics;
use crate::ssh::{self, CommandOutput, ProgressFn, shell_quote};
use crate::types::SessionKey;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("no session to {key}: {source}")]
    Session {
        key: SessionKey,
        source: Arc<ssh::Error>,
    },

    #[error("transport already closed")]
    Closed,

    #[error("remote operation on {host} failed: {source}")]
    Remote {
        host: String,
        source: Arc<ssh::Error>,
    },
}

impl TransportError {
    fn remote(target: &Target, source: ssh::Error) -> Self {
        Self::Remote {
            host: target.name.clone(),
            source: Arc::new(source),
        }
    }

    /// Whether the failure happened before any session was available.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, TransportError::Session { .. } | TransportError::Closed)
    }
}

#[derive(Debug)]
pub struct Transport {
    sessions: SessionManager,
}

impl Transport {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            sessions: SessionManager::new(connector),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Place `local_path` at `remote_path` on `target`.
    ///
    /// With `skip_if_exists`, an existing remote path counts as success and
    /// nothing is written; its content is not compared. Errors are logged and
    /// reported as `false`.
    pub async fn upload(
        &self,
        local_path: &Path,
        target: &Target,
        remote_path: &str,
        skip_if_exists: bool,
        progress: Option<&ProgressFn<'_>>,
    ) -> bool {
        match self
            .try_upload(local_path, target, remote_path, skip_if_exists, progress)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    "Failed to transfer {} to {}:{}: {}",
                    local_path.display(),
                    target.name,
                    remote_path,
                    e
                );
                false
            }
        }
    }

    /// [`upload`](Self::upload) with the failure kept as a typed error.
    pub async fn try_upload(
        &self,
        local_path: &Path,
        target: &Target,
        remote_path: &str,
        skip_if_exists: bool,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<(), TransportError> {
        let session = self.sessions.get_session(target).await?;

        if skip_if_exists {
            let exists = session
                .path_exists(remote_path)
                .await
                .map_err(|e| TransportError::remote(target, e))?;
            if exists {
                tracing::info!(
                    "{} already present on {}, skipping transfer",
                    remote_path,
                    target.name
                );
                return Ok(());
            }
        }

        let parent = Path::new(remote_path)
            .parent()
            .and_then(Path::to_str)
            .filter(|p| !p.is_empty() && *p != "/");
        if let Some(parent) = parent {
            let output = session
                .exec(&format!("mkdir -p {}", shell_quote(parent)))
                .await
                .map_err(|e| TransportError::remote(target, e))?;
            if !output.success() {
                return Err(TransportError::remote(
                    target,
                    ssh::Error::WriteFailed {
                        path: parent.to_string(),
                        reason: format!("mkdir exited {}: {}", output.exit_code, output.stderr.trim()),
                    },
                ));
            }
        }

        tracing::info!(
            "Transferring {} to {}:{}",
            local_path.display(),
            target.name,
            remote_path
        );
        let sent = session
            .write_file(local_path, remote_path, progress)
            .await
            .map_err(|e| TransportError::remote(target, e))?;
        tracing::info!("Transferred {} bytes to {}", sent, target.name);
        Ok(())
    }

    /// Run `command` on `target`. A non-zero exit status is a normal result.
    pub async fn execute(&self, target: &Target, command: &str) -> Result<CommandOutput, TransportError> {
        let session = self.sessions.get_session(target).await?;
        let output = session
            .exec(command)
            .await
            .map_err(|e| TransportError::remote(target, e))?;
        tracing::debug!("Command on {} exited {}", target.name, output.exit_code);
        Ok(output)
    }

    /// Whether `remote_path` exists on `target`.
    ///
    /// A path that cannot be stat'ed is absent; connection failures are errors.
    pub async fn exists(&self, target: &Target, remote_path: &str) -> Result<bool, TransportError> {
        let session = self.sessions.get_session(target).await?;
        session.path_exists(remote_path).await.map_err(|e| {
            tracing::warn!("Could not check {} on {}: {}", remote_path, target.name, e);
            TransportError::remote(target, e)
        })
    }

    /// Release every session. Safe to call more than once.
    pub async fn close(&self, diagnostics: &Diagnostics) -> usize {
        self.sessions.close_all(diagnostics).await
    }
}
