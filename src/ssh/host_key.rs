// ABOUTME: Host key verification policy applied while a session handshakes.
// ABOUTME: Changed keys are rejected under every policy.

use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::ssh_key;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Only hosts already in known_hosts are accepted.
    #[default]
    Strict,
    /// Unknown hosts are accepted and recorded in known_hosts.
    TrustOnFirstUse,
    /// Unknown hosts are accepted with a warning and never recorded.
    AcceptAny,
}

/// Outcome of comparing a server key to known_hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

#[derive(Debug, Clone)]
pub struct HostKeyVerifier {
    pub host: String,
    pub port: u16,
    pub policy: HostKeyPolicy,
    pub known_hosts_path: Option<PathBuf>,
}

impl HostKeyVerifier {
    pub fn verify(&self, key: &ssh_key::PublicKey) -> Verdict {
        let known = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, key, path),
            None => check_known_hosts(&self.host, self.port, key),
        };

        match known {
            Ok(true) => Verdict::Accept,
            Ok(false) => self.unknown_host(key),
            Err(russh::keys::Error::KeyChanged { line }) => Verdict::Reject(format!(
                "key differs from known_hosts entry at line {}",
                line
            )),
            Err(e) => {
                tracing::debug!("known_hosts lookup failed for {}: {}", self.host, e);
                self.unknown_host(key)
            }
        }
    }

    fn unknown_host(&self, key: &ssh_key::PublicKey) -> Verdict {
        match self.policy {
            HostKeyPolicy::Strict => Verdict::Reject("host not in known_hosts".to_string()),
            HostKeyPolicy::TrustOnFirstUse => {
                tracing::warn!(
                    "Trust-On-First-Use: accepting unknown host key for {}:{}",
                    self.host,
                    self.port
                );
                let learned = match &self.known_hosts_path {
                    Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
                    None => learn_known_hosts(&self.host, self.port, key),
                };
                if let Err(e) = learned {
                    tracing::warn!("Failed to save host key to known_hosts: {}", e);
                }
                Verdict::Accept
            }
            HostKeyPolicy::AcceptAny => {
                tracing::warn!(
                    "Host verification disabled: accepting unverified key for {}:{}",
                    self.host,
                    self.port
                );
                Verdict::Accept
            }
        }
    }
}
