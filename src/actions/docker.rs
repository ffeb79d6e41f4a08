// ABOUTME: Loads the archive into the target's Docker daemon with `docker load`.
// ABOUTME: Supports a custom docker binary, sudo and removal of the archive afterwards.

use super::options::{ActionOptions, Privilege, cleanup_command, opt_bool, opt_str};
use super::{ActionError, ActionKind, ActionPlan, PostPlacementAction};
use crate::ssh::shell_quote;

const NAME: &str = "docker";

#[derive(Debug, Default)]
pub struct DockerLoad;

impl PostPlacementAction for DockerLoad {
    fn kind(&self) -> ActionKind {
        ActionKind::Docker
    }

    fn validate(&self, options: &ActionOptions) -> Result<(), ActionError> {
        opt_str(options, NAME, "docker_cmd")?;
        Privilege::from_options(options, NAME)?;
        opt_bool(options, NAME, "cleanup_tar")?;
        Ok(())
    }

    fn plan(&self, remote_archive: &str, options: &ActionOptions) -> Result<ActionPlan, ActionError> {
        let docker_cmd = opt_str(options, NAME, "docker_cmd")?.unwrap_or("docker");
        let privilege = Privilege::from_options(options, NAME)?;

        let command = privilege.wrap(&format!("{} load < {}", docker_cmd, shell_quote(remote_archive)));
        let cleanup = cleanup_command(options, NAME, true, &privilege, remote_archive)?;
        Ok(ActionPlan { command, cleanup })
    }
}
