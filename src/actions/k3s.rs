// ABOUTME: Imports the archive into k3s's embedded containerd for air-gapped clusters.
// ABOUTME: Talks to containerd through ctr; the socket path is configurable.

use super::options::{ActionOptions, Privilege, cleanup_command, opt_bool, opt_str};
use super::{ActionError, ActionKind, ActionPlan, PostPlacementAction};
use crate::ssh::shell_quote;

const NAME: &str = "k3s_airgap";
const DEFAULT_CONTAINERD_SOCKET: &str = "/run/k3s/containerd/containerd.sock";

#[derive(Debug, Default)]
pub struct K3sAirgap;

impl PostPlacementAction for K3sAirgap {
    fn kind(&self) -> ActionKind {
        ActionKind::K3sAirgap
    }

    fn validate(&self, options: &ActionOptions) -> Result<(), ActionError> {
        // Accepted for compatibility; the import goes through `ctr`.
        opt_str(options, NAME, "k3s_path")?;
        opt_str(options, NAME, "containerd_path")?;
        Privilege::from_options(options, NAME)?;
        opt_bool(options, NAME, "cleanup_tar")?;
        Ok(())
    }

    fn plan(&self, remote_archive: &str, options: &ActionOptions) -> Result<ActionPlan, ActionError> {
        let socket = opt_str(options, NAME, "containerd_path")?.unwrap_or(DEFAULT_CONTAINERD_SOCKET);
        let privilege = Privilege::from_options(options, NAME)?;

        let command = privilege.wrap(&format!(
            "CONTAINERD_ADDRESS={} ctr -n k8s.io image import {}",
            shell_quote(socket),
            shell_quote(remote_archive)
        ));
        let cleanup = cleanup_command(options, NAME, true, &privilege, remote_archive)?;
        Ok(ActionPlan { command, cleanup })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    #[test]
    fn imports_into_k8s_namespace() {
        let plan = K3sAirgap.plan("/tmp/images.tar", &ActionOptions::new()).unwrap();
        assert_eq!(
            plan.command,
            "CONTAINERD_ADDRESS='/run/k3s/containerd/containerd.sock' ctr -n k8s.io image import '/tmp/images.tar'"
        );
        assert!(plan.cleanup.is_some());
    }

    #[test]
    fn sudo_password_wraps_import_and_cleanup() {
        let mut options = ActionOptions::new();
        options.insert("use_sudo".into(), Value::Bool(true));
        options.insert("sudo_password".into(), Value::String("pw".into()));
        options.insert("containerd_path".into(), Value::String("/run/c.sock".into()));

        let plan = K3sAirgap.plan("/tmp/a.tar", &options).unwrap();
        assert!(
            plan.command
                .starts_with(r#"echo 'pw' | sudo -S -p '' sh -c 'CONTAINERD_ADDRESS='\''/run/c.sock'\'' ctr "#)
        );
        assert_eq!(
            plan.cleanup.as_deref(),
            Some(r#"echo 'pw' | sudo -S -p '' sh -c 'rm -f '\''/tmp/a.tar'\'''"#)
        );
    }

    #[test]
    fn rejects_non_bool_cleanup() {
        let mut options = ActionOptions::new();
        options.insert("cleanup_tar".into(), Value::String("no".into()));
        assert!(K3sAirgap.validate(&options).is_err());
    }
}
