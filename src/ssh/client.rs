// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, ordered credential attempts, command execution and file streaming.

use super::auth::{Credential, default_key_paths};
use super::error::{Error, Result};
use super::host_key::{HostKeyPolicy, HostKeyVerifier, Verdict};
use super::quote::shell_quote;
use parking_lot::Mutex;
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

/// Bytes read from the local file per channel write.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Progress sink called with (bytes so far, total bytes).
pub type ProgressFn<'a> = dyn Fn(u64, u64) + Send + Sync + 'a;

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Host to dial, after ssh config resolution.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Credentials tried in order until one succeeds.
    pub credentials: Vec<Credential>,
    pub host_key_policy: HostKeyPolicy,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    pub connect_timeout: Duration,
    /// Timeout for command execution (default: 5 minutes).
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            credentials: vec![Credential::Agent, Credential::DefaultKeys],
            host_key_policy: HostKeyPolicy::Strict,
            known_hosts_path: None,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(300),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn credentials(mut self, credentials: Vec<Credential>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Output from a remote command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    verifier: HostKeyVerifier,
    rejection: Arc<Mutex<Option<String>>>,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.verifier.verify(server_public_key) {
            Verdict::Accept => Ok(true),
            Verdict::Reject(reason) => {
                *self.rejection.lock() = Some(reason);
                Ok(false)
            }
        }
    }
}

/// An established SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    /// Connect to the remote host and authenticate.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let russh_config = Config {
            inactivity_timeout: Some(Duration::from_secs(120)),
            keepalive_interval: Some(Duration::from_secs(15)),
            ..Default::default()
        };

        let rejection = Arc::new(Mutex::new(None));
        let handler = SshHandler {
            verifier: HostKeyVerifier {
                host: config.host.clone(),
                port: config.port,
                policy: config.host_key_policy,
                known_hosts_path: config.known_hosts_path.clone(),
            },
            rejection: Arc::clone(&rejection),
        };

        let connecting = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        );
        let connected = tokio::time::timeout(config.connect_timeout, connecting)
            .await
            .map_err(|_| Error::Connection {
                host: config.host.clone(),
                port: config.port,
                reason: format!("timed out after {:?}", config.connect_timeout),
            })?;

        let mut handle = match connected {
            Ok(handle) => handle,
            Err(e) => {
                if let Some(reason) = rejection.lock().take() {
                    return Err(Error::HostKeyRejected {
                        host: config.host.clone(),
                        port: config.port,
                        reason,
                    });
                }
                return Err(Error::Connection {
                    host: config.host.clone(),
                    port: config.port,
                    reason: e.to_string(),
                });
            }
        };

        Self::authenticate(&mut handle, &config).await?;

        Ok(Self { config, handle })
    }

    /// Offer each credential in turn, logging every attempt.
    async fn authenticate(handle: &mut Handle<SshHandler>, config: &SessionConfig) -> Result<()> {
        let mut attempted = Vec::new();

        for credential in &config.credentials {
            let label = credential.label();
            tracing::debug!("Trying {} for {}@{}", label, config.user, config.host);

            let accepted = match credential {
                Credential::KeyFile(path) => Self::try_key_file(handle, config, path).await,
                Credential::Password(password) => handle
                    .authenticate_password(&config.user, password)
                    .await
                    .map(|result| result.success())
                    .map_err(Error::Protocol),
                Credential::Agent => Self::try_agent(handle, config).await,
                Credential::DefaultKeys => {
                    let mut accepted = Ok(false);
                    for path in default_key_paths() {
                        accepted = Self::try_key_file(handle, config, &path).await;
                        if matches!(accepted, Ok(true)) {
                            break;
                        }
                    }
                    accepted
                }
            };

            attempted.push(label);
            match accepted {
                Ok(true) => {
                    tracing::debug!(
                        "Authenticated {}@{} with {}",
                        config.user,
                        config.host,
                        credential.label()
                    );
                    return Ok(());
                }
                Ok(false) => tracing::debug!("{} rejected by {}", credential.label(), config.host),
                Err(e) => tracing::warn!(
                    "{} unusable for {}: {}",
                    credential.label(),
                    config.host,
                    e
                ),
            }
        }

        Err(Error::AuthenticationFailed {
            user: config.user.clone(),
            host: config.host.clone(),
            attempted,
        })
    }

    async fn try_key_file(
        handle: &mut Handle<SshHandler>,
        config: &SessionConfig,
        path: &Path,
    ) -> Result<bool> {
        let key = load_secret_key(path, None).map_err(|e| Error::KeyLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .map_err(Error::Protocol)?
            .flatten();

        let result = handle
            .authenticate_publickey(
                &config.user,
                PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
            )
            .await
            .map_err(Error::Protocol)?;

        Ok(result.success())
    }

    async fn try_agent(handle: &mut Handle<SshHandler>, config: &SessionConfig) -> Result<bool> {
        let mut agent = AgentClient::connect_env()
            .await
            .map_err(|e| Error::Connection {
                host: "ssh-agent".to_string(),
                port: 0,
                reason: e.to_string(),
            })?;

        let keys = agent.request_identities().await.map_err(|e| Error::Connection {
            host: "ssh-agent".to_string(),
            port: 0,
            reason: format!("failed to list agent keys: {}", e),
        })?;

        for key in keys {
            match handle
                .authenticate_publickey_with(&config.user, key, None, &mut agent)
                .await
            {
                Ok(result) if result.success() => return Ok(true),
                _ => continue,
            }
        }
        Ok(false)
    }

    /// Whether `path` exists on the remote host.
    ///
    /// A non-zero `test -e` is absence; only channel or connection problems
    /// are errors.
    pub async fn path_exists(&self, path: &str) -> Result<bool> {
        let output = self.exec(&format!("test -e {}", shell_quote(path))).await?;
        Ok(output.success())
    }

    /// Execute a command on the remote host.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, self.config.command_timeout)
            .await
    }

    /// Execute a command with a custom timeout.
    pub async fn exec_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.exec_inner(command)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self.open_exec(command).await?;
        collect_output(&mut channel).await
    }

    async fn open_exec(&self, command: &str) -> Result<russh::Channel<client::Msg>> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        Ok(channel)
    }

    /// Stream a local file into `remote_path`, reporting progress per chunk.
    ///
    /// Returns the number of bytes sent.
    pub async fn write_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<u64> {
        let mut file = tokio::fs::File::open(local_path).await?;
        let total = file.metadata().await?.len();

        let mut channel = self
            .open_exec(&format!("cat > {}", shell_quote(remote_path)))
            .await?;

        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        let mut sent = 0u64;
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            channel
                .data(&buf[..n])
                .await
                .map_err(|e| Error::WriteFailed {
                    path: remote_path.to_string(),
                    reason: e.to_string(),
                })?;
            sent += n as u64;
            if let Some(progress) = progress {
                progress(sent, total);
            }
        }

        channel.eof().await.map_err(Error::Protocol)?;

        let output = collect_output(&mut channel).await?;
        if !output.success() {
            return Err(Error::WriteFailed {
                path: remote_path.to_string(),
                reason: format!("exit {}: {}", output.exit_code, output.stderr.trim()),
            });
        }

        Ok(sent)
    }

    /// Disconnect the session.
    pub async fn disconnect(&self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}

/// Drain a channel until exit status and EOF have both arrived.
async fn collect_output(channel: &mut russh::Channel<client::Msg>) -> Result<CommandOutput> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = 0u32;

    let mut got_exit_status = false;
    let mut got_eof = false;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
            Some(ChannelMsg::ExtendedData { data, ext: 1 }) => stderr.extend_from_slice(&data),
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                exit_code = exit_status;
                got_exit_status = true;
                if got_eof {
                    break;
                }
            }
            Some(ChannelMsg::Eof) => {
                got_eof = true;
                if got_exit_status {
                    break;
                }
            }
            Some(ChannelMsg::Close) | None => break,
            Some(_) => {}
        }
    }

    // No exit status means the channel died, not that the command finished.
    if !got_exit_status {
        return Err(Error::ChannelClosed);
    }

    Ok(CommandOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}
