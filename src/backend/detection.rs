// ABOUTME: Local container runtime selection for Docker and Podman.
// ABOUTME: Explicit config first, then DOCKER_HOST, then well-known sockets.

use super::error::BackendError;
use serde::{Deserialize, Serialize};
use std::path::Path;

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// The container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "docker"),
            RuntimeType::Podman => write!(f, "podman"),
        }
    }
}

/// Detected runtime information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub runtime_type: RuntimeType,
    /// Path to the runtime socket.
    pub socket_path: String,
}

/// Configuration for explicit runtime override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuntimeConfig {
    /// Explicit runtime type (overrides auto-detection).
    pub runtime: Option<RuntimeType>,
    /// Explicit socket path (overrides default).
    pub socket: Option<String>,
}

/// Pick the local runtime socket.
///
/// Order:
/// 1. `socket` from config
/// 2. `DOCKER_HOST` when it is a `unix://` address
/// 3. Rootless Podman (`/run/user/$UID/podman/podman.sock`)
/// 4. Rootful Podman (`/run/podman/podman.sock`)
/// 5. Docker (`/var/run/docker.sock`)
///
/// A configured runtime type without a socket restricts the search to that runtime.
pub fn detect_local(config: &RuntimeConfig) -> Result<RuntimeInfo, BackendError> {
    detect_with(config, std::env::var("DOCKER_HOST").ok(), get_uid(), |p| {
        Path::new(p).exists()
    })
}

fn detect_with(
    config: &RuntimeConfig,
    docker_host: Option<String>,
    uid: Option<String>,
    exists: impl Fn(&str) -> bool,
) -> Result<RuntimeInfo, BackendError> {
    if let Some(socket) = &config.socket {
        let socket_path = socket.strip_prefix("unix://").unwrap_or(socket).to_string();
        return Ok(RuntimeInfo {
            runtime_type: config.runtime.unwrap_or_else(|| guess_type(&socket_path)),
            socket_path,
        });
    }

    let mut candidates = Vec::new();
    if let Some(path) = docker_host.as_deref().and_then(|h| h.strip_prefix("unix://")) {
        candidates.push(path.to_string());
    }
    if let Some(uid) = uid {
        candidates.push(format!("/run/user/{}/podman/podman.sock", uid));
    }
    candidates.push(ROOTFUL_PODMAN.to_string());
    candidates.push(DOCKER_SOCKET.to_string());

    let wanted = config.runtime;
    let found = candidates
        .iter()
        .filter(|path| wanted.is_none_or(|w| guess_type(path) == w))
        .find(|path| exists(path));

    match found {
        Some(path) => Ok(RuntimeInfo {
            runtime_type: wanted.unwrap_or_else(|| guess_type(path)),
            socket_path: path.clone(),
        }),
        None => Err(BackendError::NoRuntimeFound {
            checked: candidates.join(", "),
        }),
    }
}

fn guess_type(socket_path: &str) -> RuntimeType {
    if socket_path.contains("podman") {
        RuntimeType::Podman
    } else {
        RuntimeType::Docker
    }
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        // Fall back to reading /proc/self/status
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}
