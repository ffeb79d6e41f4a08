// ABOUTME: Layered credential settings for one target and the ordered attempts derived from them.
// ABOUTME: Pure resolution; nothing here touches the network.

use crate::ssh::Credential;
use std::path::PathBuf;

/// Key file and password declared at one configuration level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthLayer {
    pub key_file: Option<PathBuf>,
    pub password: Option<String>,
}

impl AuthLayer {
    /// Apply `higher` on top of `self`; set fields in `higher` win.
    pub fn overlay(self, higher: AuthLayer) -> AuthLayer {
        AuthLayer {
            key_file: higher.key_file.or(self.key_file),
            password: higher.password.or(self.password),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthBundle {
    /// Target-level settings (target transport options, then `ssh_options`).
    pub target: AuthLayer,
    /// Settings from the global transport section.
    pub global: AuthLayer,
    /// `IdentityFile` entries from the OpenSSH client config.
    pub ssh_config_keys: Vec<PathBuf>,
    pub use_agent: bool,
    pub look_for_keys: bool,
}

impl Default for AuthBundle {
    fn default() -> Self {
        Self {
            target: AuthLayer::default(),
            global: AuthLayer::default(),
            ssh_config_keys: Vec::new(),
            use_agent: true,
            look_for_keys: true,
        }
    }
}

impl AuthBundle {
    /// Credentials in the order they will be offered.
    ///
    /// Key files that do not exist are skipped so the next method is tried.
    pub fn candidates(&self) -> Vec<Credential> {
        let mut out = Vec::new();

        for layer in [&self.target, &self.global] {
            if let Some(path) = &layer.key_file {
                if path.is_file() {
                    out.push(Credential::KeyFile(path.clone()));
                } else {
                    tracing::warn!("Key file {} not found, falling back", path.display());
                }
            }
            if let Some(password) = &layer.password {
                out.push(Credential::Password(password.clone()));
            }
        }

        for path in &self.ssh_config_keys {
            let credential = Credential::KeyFile(path.clone());
            if path.is_file() && !out.contains(&credential) {
                out.push(credential);
            }
        }

        if self.use_agent {
            out.push(Credential::Agent);
        }
        if self.look_for_keys {
            out.push(Credential::DefaultKeys);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "key").unwrap();
        path
    }

    #[test]
    fn full_precedence_order() {
        let dir = tempfile::tempdir().unwrap();
        let target_key = key(dir.path(), "target");
        let global_key = key(dir.path(), "global");

        let bundle = AuthBundle {
            target: AuthLayer {
                key_file: Some(target_key.clone()),
                password: Some("tp".into()),
            },
            global: AuthLayer {
                key_file: Some(global_key.clone()),
                password: Some("gp".into()),
            },
            ..AuthBundle::default()
        };

        assert_eq!(
            bundle.candidates(),
            vec![
                Credential::KeyFile(target_key),
                Credential::Password("tp".into()),
                Credential::KeyFile(global_key),
                Credential::Password("gp".into()),
                Credential::Agent,
                Credential::DefaultKeys,
            ]
        );
    }

    #[test]
    fn missing_target_key_falls_back() {
        let bundle = AuthBundle {
            target: AuthLayer {
                key_file: Some(PathBuf::from("/nonexistent/id_target")),
                password: None,
            },
            global: AuthLayer {
                key_file: None,
                password: Some("gp".into()),
            },
            use_agent: false,
            look_for_keys: false,
            ..AuthBundle::default()
        };
        assert_eq!(bundle.candidates(), vec![Credential::Password("gp".into())]);
    }

    #[test]
    fn overlay_prefers_higher_layer() {
        let low = AuthLayer {
            key_file: Some(PathBuf::from("/low")),
            password: Some("low".into()),
        };
        let high = AuthLayer {
            key_file: None,
            password: Some("high".into()),
        };
        let merged = low.overlay(high);
        assert_eq!(merged.key_file, Some(PathBuf::from("/low")));
        assert_eq!(merged.password.as_deref(), Some("high"));
    }
}
