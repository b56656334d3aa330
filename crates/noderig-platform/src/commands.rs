use async_trait::async_trait;
use log::{debug, error, trace};
use tokio::process::Command;

use noderig_backend::{CommandOutput, CommandRunner, CommandSpec, ProvisionError};

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

pub trait HideWindow {
    fn hide_window(&mut self) -> &mut Self;
}

impl HideWindow for tokio::process::Command {
    #[cfg(windows)]
    fn hide_window(&mut self) -> &mut Self {
        self.creation_flags(CREATE_NO_WINDOW)
    }

    #[cfg(not(windows))]
    fn hide_window(&mut self) -> &mut Self {
        self
    }
}

/// Runs commands as child processes of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn build_command(spec: &CommandSpec) -> Result<Command, ProvisionError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        cmd.kill_on_drop(true);

        if let Some(cwd) = &spec.cwd {
            debug!("Setting working directory {}", cwd.display());
            cmd.current_dir(cwd);
        }

        #[cfg(unix)]
        Self::apply_identity(&mut cmd, spec)?;

        // Explicit environment wins over anything derived from the identity.
        cmd.envs(&spec.environment);
        cmd.hide_window();
        Ok(cmd)
    }

    #[cfg(unix)]
    fn apply_identity(cmd: &mut Command, spec: &CommandSpec) -> Result<(), ProvisionError> {
        use crate::identity::{resolve_group, resolve_user};

        let mut primary_gid = None;
        if let Some(user) = &spec.user {
            let entry = resolve_user(user)?;
            debug!("Running as uid {} (home {})", entry.uid, entry.home.display());
            cmd.uid(entry.uid);
            cmd.env("HOME", &entry.home);
            primary_gid = Some(entry.gid);
        }

        let gid = match &spec.group {
            Some(group) => Some(resolve_group(group)?),
            None => primary_gid,
        };
        if let Some(gid) = gid {
            cmd.gid(gid);
        }
        Ok(())
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProvisionError> {
        let display = spec.display();
        debug!("Executing command: {display}");

        let mut cmd = Self::build_command(spec)?;
        let output = match spec.timeout {
            Some(timeout) => tokio::time::timeout(timeout, cmd.output())
                .await
                .map_err(|_| {
                    error!("Command timed out after {}s: {display}", timeout.as_secs());
                    ProvisionError::Timeout {
                        command: display.clone(),
                        seconds: timeout.as_secs(),
                    }
                })??,
            None => cmd.output().await?,
        };

        debug!("Command exit status: {:?}", output.status);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        trace!("stdout: {stdout}");
        if !stderr.is_empty() {
            trace!("stderr: {stderr}");
        }

        Ok(CommandOutput {
            status: output.status.code(),
            stdout,
            stderr,
        })
    }
}
