// ABOUTME: Post-placement actions run on each target once the archive is in place.
// ABOUTME: A closed set of action kinds dispatched through a registry, with global/target option merging.

mod command;
mod docker;
mod error;
mod k3s;
mod options;

pub use command::RemoteCommand;
pub use docker::DockerLoad;
pub use error::ActionError;
pub use k3s::K3sAirgap;
pub use options::{ActionOptions, Privilege};

use crate::config::Target;
use crate::diagnostics::{Diagnostics, Warning};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Known post-placement actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "docker")]
    Docker,
    #[serde(rename = "k3s_airgap")]
    K3sAirgap,
    #[serde(rename = "generic_ssh")]
    Command,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::Docker, ActionKind::K3sAirgap, ActionKind::Command];

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Docker => "docker",
            ActionKind::K3sAirgap => "k3s_airgap",
            ActionKind::Command => "generic_ssh",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ActionError::UnknownAction(s.to_string()))
    }
}

/// An action as declared in configuration, globally or on one target.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActionSpec {
    #[serde(default)]
    pub plugin: Option<String>,
    #[serde(default)]
    pub options: ActionOptions,
}

/// The action a target will actually run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAction {
    pub kind: ActionKind,
    pub options: ActionOptions,
}

/// Remote commands an action runs for one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPlan {
    pub command: String,
    /// Run after a successful `command`; failure only warns.
    pub cleanup: Option<String>,
}

pub trait PostPlacementAction: Send + Sync {
    fn kind(&self) -> ActionKind;

    /// Check option types before anything touches the network.
    fn validate(&self, options: &ActionOptions) -> Result<(), ActionError>;

    fn plan(&self, remote_archive: &str, options: &ActionOptions) -> Result<ActionPlan, ActionError>;
}

/// Merge a global action declaration with a target's override.
///
/// The target's name wins over the global one and its option keys override
/// global keys. Returns `None` when neither side names an action.
pub fn merge(global: Option<&ActionSpec>, target: Option<&ActionSpec>) -> Option<(String, ActionOptions)> {
    let name = target
        .and_then(|t| t.plugin.clone())
        .or_else(|| global.and_then(|g| g.plugin.clone()))?;

    let mut options = global.map(|g| g.options.clone()).unwrap_or_default();
    if let Some(target) = target {
        options.extend(target.options.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    Some((name, options))
}

#[derive(Debug, Default)]
pub struct ActionRegistry {
    docker: DockerLoad,
    k3s: K3sAirgap,
    command: RemoteCommand,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ActionKind) -> &dyn PostPlacementAction {
        match kind {
            ActionKind::Docker => &self.docker,
            ActionKind::K3sAirgap => &self.k3s,
            ActionKind::Command => &self.command,
        }
    }

    /// Merge, look up and validate the action for one target.
    pub fn resolve(
        &self,
        global: Option<&ActionSpec>,
        target: Option<&ActionSpec>,
    ) -> Result<Option<ResolvedAction>, ActionError> {
        let Some((name, options)) = merge(global, target) else {
            return Ok(None);
        };
        let kind: ActionKind = name.parse()?;
        self.get(kind).validate(&options)?;
        Ok(Some(ResolvedAction { kind, options }))
    }

    /// Run `action` on `target` against the archive at `remote_archive`.
    pub async fn execute(
        &self,
        transport: &Transport,
        target: &Target,
        action: &ResolvedAction,
        remote_archive: &str,
        diagnostics: &Diagnostics,
    ) -> Result<(), ActionError> {
        let plan = self.get(action.kind).plan(remote_archive, &action.options)?;

        tracing::info!("Running {} on {}", action.kind, target.name);
        let output = transport.execute(target, &plan.command).await?;
        if !output.success() {
            return Err(ActionError::RemoteFailed {
                action: action.kind.name(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        if !output.stdout.is_empty() {
            tracing::debug!("{} output on {}: {}", action.kind, target.name, output.stdout.trim());
        }

        if let Some(cleanup) = plan.cleanup {
            match transport.execute(target, &cleanup).await {
                Ok(out) if out.success() => {
                    tracing::debug!("Removed {} on {}", remote_archive, target.name);
                }
                Ok(out) => diagnostics.warn(Warning::remote_cleanup(format!(
                    "failed to remove {} on {}: {}",
                    remote_archive,
                    target.name,
                    out.stderr.trim()
                ))),
                Err(e) => diagnostics.warn(Warning::remote_cleanup(format!(
                    "failed to remove {} on {}: {}",
                    remote_archive, target.name, e
                ))),
            }
        }

        tracing::info!("{} completed on {}", action.kind, target.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn spec(plugin: Option<&str>, pairs: &[(&str, i64)]) -> ActionSpec {
        ActionSpec {
            plugin: plugin.map(str::to_string),
            options: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::Number((*v).into())))
                .collect(),
        }
    }

    #[test]
    fn target_keys_override_global_keys() {
        let global = spec(Some("docker"), &[("a", 1), ("b", 2)]);
        let target = spec(None, &[("b", 3), ("c", 4)]);

        let (name, options) = merge(Some(&global), Some(&target)).unwrap();
        assert_eq!(name, "docker");
        assert_eq!(options, spec(None, &[("a", 1), ("b", 3), ("c", 4)]).options);
    }

    #[test]
    fn target_name_wins() {
        let global = spec(Some("docker"), &[]);
        let target = spec(Some("k3s_airgap"), &[]);
        let (name, _) = merge(Some(&global), Some(&target)).unwrap();
        assert_eq!(name, "k3s_airgap");
    }

    #[test]
    fn no_name_means_skip() {
        assert!(merge(None, Some(&spec(None, &[("a", 1)]))).is_none());
        assert!(merge(None, None).is_none());
    }

    #[test]
    fn unknown_name_is_typed_error() {
        let registry = ActionRegistry::new();
        let err = registry
            .resolve(Some(&spec(Some("helm"), &[])), None)
            .unwrap_err();
        assert!(matches!(err, ActionError::UnknownAction(name) if name == "helm"));
    }

    #[test]
    fn resolve_validates_options() {
        let registry = ActionRegistry::new();
        let global = ActionSpec {
            plugin: Some("generic_ssh".to_string()),
            options: ActionOptions::new(),
        };
        assert!(matches!(
            registry.resolve(Some(&global), None),
            Err(ActionError::MissingOption { .. })
        ));
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.name().parse::<ActionKind>().unwrap(), kind);
            assert_eq!(ActionRegistry::new().get(kind).kind(), kind);
        }
    }
}
