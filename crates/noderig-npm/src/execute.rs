use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;

use noderig_backend::{CommandOutput, CommandRunner, CommandSpec, Identity, ProvisionError};

use crate::target::RuntimeTarget;

/// A node invocation with the runtime's environment applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JavascriptExecute {
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub user: Option<Identity>,
    pub group: Option<Identity>,
    /// Overrides on top of the runtime's variables.
    pub environment: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl JavascriptExecute {
    #[must_use]
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn command(&self, target: &RuntimeTarget) -> CommandSpec {
        let mut environment = target.environment.clone();
        environment.extend(self.environment.clone());
        CommandSpec::new(&target.node_binary)
            .args(self.args.iter().cloned())
            .cwd(self.cwd.clone())
            .user(self.user.clone())
            .group(self.group.clone())
            .envs(&environment)
            .timeout(self.timeout)
    }

    /// Run the script. The exit status is left to the caller.
    ///
    /// # Errors
    /// Returns an error if the process cannot be started or times out.
    pub async fn run(
        &self,
        runner: &dyn CommandRunner,
        target: &RuntimeTarget,
    ) -> Result<CommandOutput, ProvisionError> {
        let command = self.command(target);
        debug!("Executing {}", command.display());
        runner.run(&command).await
    }
}
