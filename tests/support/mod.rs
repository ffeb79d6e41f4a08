// ABOUTME: Shared fakes for integration tests: an in-memory connector and artifact backend.
// ABOUTME: Every call is recorded so tests can count connects, writes and commands per host.

#![allow(dead_code)]

use async_trait::async_trait;
use outrider::backend::{ArtifactBackend, BackendError};
use outrider::config::{Config, ResolveOptions, ResolvedConfig, Target};
use outrider::ssh::{self, CommandOutput, ProgressFn};
use outrider::transport::{Connector, RemoteSession};
use outrider::types::ImageName;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// =============================================================================
// Remote side
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Exec(String),
    Exists(String),
    Write { remote: String, bytes: u64 },
    Close,
}

#[derive(Default)]
struct Remote {
    refused: HashSet<String>,
    failing_writes: HashSet<String>,
    panicking_writes: HashSet<String>,
    failing_exec: Vec<(String, String, u32)>,
    write_delay: Duration,
    files: Mutex<HashSet<(String, String)>>,
    calls: Mutex<Vec<(String, Call)>>,
    active_writes: AtomicUsize,
    peak_writes: AtomicUsize,
}

impl Remote {
    fn record(&self, host: &str, call: Call) {
        self.calls.lock().push((host.to_string(), call));
    }
}

/// Connector whose sessions live in memory. Configure it before sharing.
#[derive(Clone, Default)]
pub struct FakeConnector {
    remote: Arc<Remote>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn configure(&mut self) -> &mut Remote {
        Arc::get_mut(&mut self.remote).expect("configure the fake before sharing it")
    }

    /// Authentication to `host` fails.
    pub fn refuse(mut self, host: &str) -> Self {
        self.configure().refused.insert(host.to_string());
        self
    }

    /// Writes to `host` fail mid-stream.
    pub fn fail_writes(mut self, host: &str) -> Self {
        self.configure().failing_writes.insert(host.to_string());
        self
    }

    /// Writes to `host` panic, as a bug in a worker would.
    pub fn panic_writes(mut self, host: &str) -> Self {
        self.configure().panicking_writes.insert(host.to_string());
        self
    }

    /// Commands on `host` containing `needle` exit with `code`.
    pub fn fail_exec(mut self, host: &str, needle: &str, code: u32) -> Self {
        self.configure()
            .failing_exec
            .push((host.to_string(), needle.to_string(), code));
        self
    }

    /// `path` already exists on `host`.
    pub fn with_file(self, host: &str, path: &str) -> Self {
        self.remote
            .files
            .lock()
            .insert((host.to_string(), path.to_string()));
        self
    }

    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.configure().write_delay = delay;
        self
    }

    pub fn calls(&self, host: &str) -> Vec<Call> {
        self.remote
            .calls
            .lock()
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c.clone())
            .collect()
    }

    fn count(&self, host: &str, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls(host).iter().filter(|c| pred(c)).count()
    }

    pub fn connects(&self, host: &str) -> usize {
        self.count(host, |c| *c == Call::Connect)
    }

    pub fn writes(&self, host: &str) -> usize {
        self.count(host, |c| matches!(c, Call::Write { .. }))
    }

    pub fn closes(&self, host: &str) -> usize {
        self.count(host, |c| *c == Call::Close)
    }

    pub fn commands(&self, host: &str) -> Vec<String> {
        self.calls(host)
            .into_iter()
            .filter_map(|c| match c {
                Call::Exec(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    pub fn peak_concurrent_writes(&self) -> usize {
        self.remote.peak_writes.load(Ordering::SeqCst)
    }

    pub fn has_file(&self, host: &str, path: &str) -> bool {
        self.remote
            .files
            .lock()
            .contains(&(host.to_string(), path.to_string()))
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, target: &Target) -> ssh::Result<Arc<dyn RemoteSession>> {
        self.remote.record(&target.name, Call::Connect);
        tokio::task::yield_now().await;
        if self.remote.refused.contains(&target.name) {
            return Err(ssh::Error::AuthenticationFailed {
                user: target.user.clone(),
                host: target.hostname.clone(),
                attempted: vec!["default keys".to_string()],
            });
        }
        Ok(Arc::new(FakeSession {
            host: target.name.clone(),
            remote: Arc::clone(&self.remote),
        }))
    }
}

struct FakeSession {
    host: String,
    remote: Arc<Remote>,
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput> {
        self.remote.record(&self.host, Call::Exec(command.to_string()));
        let failure = self
            .remote
            .failing_exec
            .iter()
            .find(|(host, needle, _)| *host == self.host && command.contains(needle.as_str()));
        Ok(match failure {
            Some((_, _, code)) => CommandOutput {
                exit_code: *code,
                stdout: String::new(),
                stderr: "simulated failure".to_string(),
            },
            None => CommandOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            },
        })
    }

    async fn path_exists(&self, path: &str) -> ssh::Result<bool> {
        self.remote.record(&self.host, Call::Exists(path.to_string()));
        Ok(self
            .remote
            .files
            .lock()
            .contains(&(self.host.clone(), path.to_string())))
    }

    async fn write_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        progress: Option<&ProgressFn<'_>>,
    ) -> ssh::Result<u64> {
        let total = tokio::fs::metadata(local_path).await?.len();

        let now = self.remote.active_writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.remote.peak_writes.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.remote.write_delay).await;
        self.remote.active_writes.fetch_sub(1, Ordering::SeqCst);

        if self.remote.panicking_writes.contains(&self.host) {
            panic!("write to {} blew up", self.host);
        }

        if let Some(report) = progress {
            report(total / 2, total);
        }
        if self.remote.failing_writes.contains(&self.host) {
            return Err(ssh::Error::WriteFailed {
                path: remote_path.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        if let Some(report) = progress {
            report(total, total);
        }

        self.remote.record(
            &self.host,
            Call::Write {
                remote: remote_path.to_string(),
                bytes: total,
            },
        );
        self.remote
            .files
            .lock()
            .insert((self.host.clone(), remote_path.to_string()));
        Ok(total)
    }

    async fn close(&self) -> ssh::Result<()> {
        self.remote.record(&self.host, Call::Close);
        Ok(())
    }
}

// =============================================================================
// Local side
// =============================================================================

/// Backend that writes a small deterministic archive instead of talking to a runtime.
#[derive(Default)]
pub struct FakeBackend {
    failing_pull: Option<String>,
    fail_package: bool,
    pulls: Mutex<Vec<String>>,
    packages: AtomicUsize,
    unpackaged: Mutex<Vec<PathBuf>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_pull(image: &str) -> Self {
        Self {
            failing_pull: Some(image.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_package() -> Self {
        Self {
            fail_package: true,
            ..Self::default()
        }
    }

    pub fn pulls(&self) -> Vec<String> {
        self.pulls.lock().clone()
    }

    pub fn packages(&self) -> usize {
        self.packages.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactBackend for FakeBackend {
    async fn pull(&self, image: &ImageName) -> Result<(), BackendError> {
        self.pulls.lock().push(image.to_string());
        if self.failing_pull.as_deref() == Some(image.as_str()) {
            return Err(BackendError::NoRuntimeFound {
                checked: "fake".to_string(),
            });
        }
        Ok(())
    }

    async fn package(&self, images: &[ImageName], output: &Path) -> Result<u64, BackendError> {
        self.packages.fetch_add(1, Ordering::SeqCst);
        if self.fail_package {
            return Err(BackendError::WriteArchive {
                path: output.to_path_buf(),
                source: std::io::Error::other("disk full"),
            });
        }
        let body = images
            .iter()
            .map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .repeat(64);
        std::fs::write(output, &body).map_err(|source| BackendError::WriteArchive {
            path: output.to_path_buf(),
            source,
        })?;
        Ok(body.len() as u64)
    }

    async fn unpackage(&self, archive: &Path) -> Result<(), BackendError> {
        self.unpackaged.lock().push(archive.to_path_buf());
        Ok(())
    }
}

// =============================================================================
// Config helpers
// =============================================================================

/// A run config with the given targets writing its archive under `dir`.
///
/// `extra` is appended verbatim as top-level YAML.
pub fn run_config(dir: &Path, targets: &[&str], extra: &str, opts: &ResolveOptions) -> ResolvedConfig {
    let mut yaml = String::from("images:\n  - \"x:2\"\n  - \"x:1\"\n  - \"x:1\"\n");
    yaml.push_str("transport:\n  options:\n    ssh_config: /nonexistent/ssh_config\n");
    yaml.push_str("targets:\n");
    for target in targets {
        yaml.push_str(&format!("  - {target}\n"));
    }
    yaml.push_str(&format!(
        "output_tar: \"{}\"\n",
        dir.join("out.tar").display()
    ));
    yaml.push_str(extra);
    Config::from_yaml(&yaml)
        .expect("test config parses")
        .resolve(opts)
        .expect("test config resolves")
}
