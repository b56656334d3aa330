use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info};

use noderig_backend::{CommandRunner, CommandSpec, Identity, ProvisionError};

use crate::target::RuntimeTarget;

/// Coarse limit for dependency installs, which may compile native addons.
pub const PROJECT_INSTALL_TIMEOUT: Duration = Duration::from_secs(900);

/// `npm install` of a project's declared dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInstall {
    pub path: PathBuf,
    pub production: bool,
    pub unsafe_perm: Option<bool>,
    pub user: Option<Identity>,
    pub group: Option<Identity>,
    pub timeout: Duration,
}

impl ProjectInstall {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            production: true,
            unsafe_perm: Some(true),
            user: None,
            group: None,
            timeout: PROJECT_INSTALL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn command(&self, target: &RuntimeTarget) -> CommandSpec {
        let mut command = CommandSpec::new(&target.npm_binary).arg("install");
        if self.production {
            command = command.arg("--production");
        }
        if let Some(unsafe_perm) = self.unsafe_perm {
            command = command.args(["--unsafe-perm".to_string(), unsafe_perm.to_string()]);
        }
        command
            .cwd(Some(self.path.clone()))
            .user(self.user.clone())
            .group(self.group.clone())
            .envs(&target.command_environment())
            .timeout(Some(self.timeout))
    }

    /// Run the install. Returns whether npm reported doing anything, which it
    /// signals by printing at all.
    ///
    /// # Errors
    /// Returns [`ProvisionError::PackageManager`] on a non-zero exit.
    pub async fn run(
        &self,
        runner: &dyn CommandRunner,
        target: &RuntimeTarget,
    ) -> Result<bool, ProvisionError> {
        let command = self.command(target);
        debug!("Installing dependencies in {}", self.path.display());
        let output = runner.run(&command).await?;
        if !output.success() {
            return Err(ProvisionError::PackageManager {
                command: command.display(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        let updated = !output.stdout.trim().is_empty();
        if updated {
            info!("Dependencies of {} updated", self.path.display());
        }
        Ok(updated)
    }
}
