// ABOUTME: Target declarations as written in configuration and their resolved form.
// ABOUTME: Parses shorthand like "host", "user@host", "host:port", "user@host:port".

use super::auth::{AuthBundle, AuthLayer};
use crate::actions::ActionSpec;
use crate::ssh::{HostKeyPolicy, HostSettings, expand_home};
use crate::types::SessionKey;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_USER: &str = "root";

/// Connection options accepted both globally and per target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransportOptions {
    #[serde(default)]
    pub key_file: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ssh_config: Option<String>,
    #[serde(default)]
    pub known_hosts: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub command_timeout: Option<Duration>,
}

impl TransportOptions {
    pub(crate) fn auth_layer(&self) -> AuthLayer {
        AuthLayer {
            key_file: self.key_file.as_deref().map(expand_home),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransportSection {
    #[serde(rename = "type", default = "default_transport_type")]
    pub kind: String,
    #[serde(default)]
    pub options: TransportOptions,
}

fn default_transport_type() -> String {
    "ssh".to_string()
}

/// Highest-precedence per-target overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SshOptions {
    #[serde(default)]
    pub key_file: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetSpec {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub ssh_options: SshOptions,
    #[serde(default)]
    pub transport: Option<TransportSection>,
    #[serde(default)]
    pub post_instructions: Option<ActionSpec>,
    #[serde(default)]
    pub trust_first_connection: bool,
}

impl TargetSpec {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("target address cannot be empty".to_string());
        }

        // Parse format: [user@]host[:port]
        let (user_part, rest) = match s.split_once('@') {
            Some((user, rest)) => (Some(user), rest),
            None => (None, s),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {}", port_str))?;
                (host, Some(port))
            }
            None => (rest, None),
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }
        if user_part.is_some_and(str::is_empty) {
            return Err("user cannot be empty".to_string());
        }

        Ok(TargetSpec {
            host: host.to_string(),
            port,
            user: user_part.map(str::to_string),
            ssh_options: SshOptions::default(),
            transport: None,
            post_instructions: None,
            trust_first_connection: false,
        })
    }

    /// Resolve against the global transport options and ssh config lookup.
    pub fn resolve(
        self,
        global: &TransportOptions,
        ssh_config: HostSettings,
        skip_host_verification: bool,
    ) -> Target {
        let target_transport = self.transport.map(|t| t.options).unwrap_or_default();
        let explicit = AuthLayer {
            key_file: self.ssh_options.key_file.as_deref().map(expand_home),
            password: self.ssh_options.password.clone(),
        };

        let host_key_policy = if skip_host_verification {
            HostKeyPolicy::AcceptAny
        } else if self.trust_first_connection {
            HostKeyPolicy::TrustOnFirstUse
        } else {
            HostKeyPolicy::Strict
        };

        Target {
            hostname: ssh_config.hostname.unwrap_or_else(|| self.host.clone()),
            port: self
                .ssh_options
                .port
                .or(self.port)
                .or(ssh_config.port)
                .unwrap_or(DEFAULT_PORT),
            user: self
                .ssh_options
                .user
                .or(self.user)
                .or(ssh_config.user)
                .unwrap_or_else(|| DEFAULT_USER.to_string()),
            auth: AuthBundle {
                target: target_transport.auth_layer().overlay(explicit),
                global: global.auth_layer(),
                ssh_config_keys: ssh_config.identity_files,
                ..AuthBundle::default()
            },
            host_key_policy,
            post_placement: self.post_instructions,
            name: self.host,
        }
    }
}

/// A configured target: either shorthand or a full map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TargetEntry {
    Simple(String),
    Detailed(TargetSpec),
}

impl TargetEntry {
    pub(crate) fn into_spec(self) -> Result<TargetSpec, String> {
        match self {
            TargetEntry::Simple(s) => TargetSpec::parse(&s),
            TargetEntry::Detailed(spec) => Ok(spec),
        }
    }
}

/// One remote machine with everything needed to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Host as written in configuration.
    pub name: String,
    /// Address actually dialed.
    pub hostname: String,
    pub port: u16,
    pub user: String,
    pub auth: AuthBundle,
    pub host_key_policy: HostKeyPolicy,
    /// Target-level post-placement override.
    pub post_placement: Option<ActionSpec>,
}

impl Target {
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(&self.hostname, self.port)
    }

    /// How the target appears in reports and the transfer ledger. The port
    /// is included when it is not 22 so `h` and `h:2222` stay distinct.
    pub fn label(&self) -> String {
        if self.port == DEFAULT_PORT {
            self.name.clone()
        } else {
            format!("{}:{}", self.name, self.port)
        }
    }

    /// A target with defaults, mainly for tests and tooling.
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        Target {
            name: host.clone(),
            hostname: host,
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            auth: AuthBundle::default(),
            host_key_policy: HostKeyPolicy::Strict,
            post_placement: None,
        }
    }
}
