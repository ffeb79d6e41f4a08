// ABOUTME: Typed access to free-form action options and the shared sudo/cleanup settings.
// ABOUTME: Every reader rejects a present key of the wrong type.

use super::error::ActionError;
use crate::ssh::shell_quote;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Options as declared in configuration, after merging.
pub type ActionOptions = BTreeMap<String, Value>;

pub(crate) fn opt_str<'a>(
    options: &'a ActionOptions,
    action: &'static str,
    key: &str,
) -> Result<Option<&'a str>, ActionError> {
    match options.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ActionError::InvalidOption {
            action,
            key: key.to_string(),
            expected: "string",
        }),
    }
}

pub(crate) fn opt_bool(
    options: &ActionOptions,
    action: &'static str,
    key: &str,
) -> Result<Option<bool>, ActionError> {
    match options.get(key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ActionError::InvalidOption {
            action,
            key: key.to_string(),
            expected: "boolean",
        }),
    }
}

pub(crate) fn require_str<'a>(
    options: &'a ActionOptions,
    action: &'static str,
    key: &str,
) -> Result<&'a str, ActionError> {
    opt_str(options, action, key)?.ok_or_else(|| ActionError::MissingOption {
        action,
        key: key.to_string(),
    })
}

/// Privilege escalation shared by every action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Privilege {
    pub use_sudo: bool,
    pub sudo_password: Option<String>,
}

impl Privilege {
    pub(crate) fn from_options(
        options: &ActionOptions,
        action: &'static str,
    ) -> Result<Self, ActionError> {
        Ok(Self {
            use_sudo: opt_bool(options, action, "use_sudo")?.unwrap_or(false),
            sudo_password: opt_str(options, action, "sudo_password")?.map(str::to_string),
        })
    }

    /// Prefix `command` with sudo, feeding the password on stdin when set.
    ///
    /// With a password the command runs under `sh -c` so its own redirects
    /// cannot take sudo's stdin away from the password pipe.
    pub fn wrap(&self, command: &str) -> String {
        match (self.use_sudo, &self.sudo_password) {
            (false, _) => command.to_string(),
            (true, Some(password)) => format!(
                "echo {} | sudo -S -p '' sh -c {}",
                shell_quote(password),
                shell_quote(command)
            ),
            (true, None) => format!("sudo {}", command),
        }
    }
}

/// Command removing the transferred archive, when cleanup is enabled.
pub(crate) fn cleanup_command(
    options: &ActionOptions,
    action: &'static str,
    default_cleanup: bool,
    privilege: &Privilege,
    remote_archive: &str,
) -> Result<Option<String>, ActionError> {
    let cleanup = opt_bool(options, action, "cleanup_tar")?.unwrap_or(default_cleanup);
    Ok(cleanup.then(|| privilege.wrap(&format!("rm -f {}", shell_quote(remote_archive)))))
}
