// ABOUTME: Credentials a session may try, in the order they are offered to the server.
// ABOUTME: Labels name each attempt without revealing secrets.

use std::fmt;
use std::path::PathBuf;

/// Key files probed when nothing more specific authenticates.
pub const DEFAULT_KEY_NAMES: [&str; 3] = ["id_ed25519", "id_rsa", "id_ecdsa"];

/// One authentication attempt.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    KeyFile(PathBuf),
    Password(String),
    Agent,
    DefaultKeys,
}

impl Credential {
    /// Human-readable description used in logs and errors.
    pub fn label(&self) -> String {
        match self {
            Credential::KeyFile(path) => format!("key file {}", path.display()),
            Credential::Password(_) => "password".to_string(),
            Credential::Agent => "ssh agent".to_string(),
            Credential::DefaultKeys => "default keys".to_string(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::Agent => f.write_str("Agent"),
            Credential::DefaultKeys => f.write_str("DefaultKeys"),
        }
    }
}

/// Existing key files under `~/.ssh` in probe order.
pub fn default_key_paths() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    DEFAULT_KEY_NAMES
        .iter()
        .map(|name| home.join(".ssh").join(name))
        .filter(|path| path.is_file())
        .collect()
}
