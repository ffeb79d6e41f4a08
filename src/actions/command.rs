// ABOUTME: Runs an operator-supplied command, substituting `{tar_path}` with the archive path.
// ABOUTME: The archive is only removed afterwards when cleanup_tar is set.

use super::options::{ActionOptions, Privilege, cleanup_command, opt_bool, require_str};
use super::{ActionError, ActionKind, ActionPlan, PostPlacementAction};

const NAME: &str = "generic_ssh";
const PLACEHOLDER: &str = "{tar_path}";

#[derive(Debug, Default)]
pub struct RemoteCommand;

impl PostPlacementAction for RemoteCommand {
    fn kind(&self) -> ActionKind {
        ActionKind::Command
    }

    fn validate(&self, options: &ActionOptions) -> Result<(), ActionError> {
        if require_str(options, NAME, "command")?.trim().is_empty() {
            return Err(ActionError::MissingOption {
                action: NAME,
                key: "command".to_string(),
            });
        }
        Privilege::from_options(options, NAME)?;
        opt_bool(options, NAME, "cleanup_tar")?;
        Ok(())
    }

    fn plan(&self, remote_archive: &str, options: &ActionOptions) -> Result<ActionPlan, ActionError> {
        let template = require_str(options, NAME, "command")?;
        let privilege = Privilege::from_options(options, NAME)?;

        let command = privilege.wrap(&template.replace(PLACEHOLDER, remote_archive));
        let cleanup = cleanup_command(options, NAME, false, &privilege, remote_archive)?;
        Ok(ActionPlan { command, cleanup })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn with_command(command: &str) -> ActionOptions {
        let mut options = ActionOptions::new();
        options.insert("command".into(), Value::String(command.into()));
        options
    }

    #[test]
    fn substitutes_every_placeholder() {
        let plan = RemoteCommand
            .plan("/srv/i.tar", &with_command("ls -l {tar_path} && sha256sum {tar_path}"))
            .unwrap();
        assert_eq!(plan.command, "ls -l /srv/i.tar && sha256sum /srv/i.tar");
        assert!(plan.cleanup.is_none());
    }

    #[test]
    fn command_is_required() {
        let err = RemoteCommand.validate(&ActionOptions::new()).unwrap_err();
        assert!(matches!(err, ActionError::MissingOption { .. }));
        assert!(RemoteCommand.validate(&with_command("  ")).is_err());
    }

    #[test]
    fn opt_in_cleanup() {
        let mut options = with_command("true");
        options.insert("cleanup_tar".into(), Value::Bool(true));
        let plan = RemoteCommand.plan("/t.tar", &options).unwrap();
        assert_eq!(plan.cleanup.as_deref(), Some("rm -f '/t.tar'"));
    }
}
