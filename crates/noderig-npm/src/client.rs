use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};
use semver::Version;
use serde_json::Value;

use noderig_backend::{CommandOutput, CommandRunner, CommandSpec, Identity, ProvisionError};

use crate::capabilities::{NpmCapabilities, parse_npm_version};
use crate::target::RuntimeTarget;

/// `npm outdated` exits with this status when it found something to report.
const OUTDATED_FOUND_STATUS: i32 = 1;

/// Drives one npm binary in one install scope.
///
/// Without a `path` every call runs with `--global`.
#[derive(Clone)]
pub struct NpmClient {
    runner: Arc<dyn CommandRunner>,
    target: RuntimeTarget,
    path: Option<PathBuf>,
    user: Option<Identity>,
    group: Option<Identity>,
    timeout: Option<Duration>,
}

impl NpmClient {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, target: RuntimeTarget) -> Self {
        Self {
            runner,
            target,
            path: None,
            user: None,
            group: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn path(mut self, path: Option<PathBuf>) -> Self {
        self.path = path;
        self
    }

    #[must_use]
    pub fn user(mut self, user: Option<Identity>) -> Self {
        self.user = user;
        self
    }

    #[must_use]
    pub fn group(mut self, group: Option<Identity>) -> Self {
        self.group = group;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn target(&self) -> &RuntimeTarget {
        &self.target
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.path.is_none()
    }

    /// `<npm> <subcommand> --json [--global] <args>`.
    #[must_use]
    pub fn command<S: AsRef<str>>(&self, subcommand: &str, args: &[S]) -> CommandSpec {
        let mut command = CommandSpec::new(&self.target.npm_binary)
            .arg(subcommand)
            .arg("--json");
        if self.is_global() {
            command = command.arg("--global");
        }
        command
            .args(args.iter().map(|arg| arg.as_ref().to_string()))
            .cwd(self.path.clone())
            .user(self.user.clone())
            .group(self.group.clone())
            .envs(&self.target.command_environment())
            .timeout(self.timeout)
    }

    async fn run(
        &self,
        command: &CommandSpec,
        tolerated: &[i32],
    ) -> Result<CommandOutput, ProvisionError> {
        debug!("Running npm: {}", command.display());
        let output = self.runner.run(command).await?;
        let accepted = output.success()
            || output
                .status
                .is_some_and(|status| tolerated.contains(&status));
        if !accepted {
            return Err(ProvisionError::PackageManager {
                command: command.display(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        trace!("npm stdout: {}", output.stdout);
        Ok(output)
    }

    /// Run a subcommand and return its raw output.
    ///
    /// # Errors
    /// Returns [`ProvisionError::PackageManager`] on a non-zero exit.
    pub async fn execute<S: AsRef<str>>(
        &self,
        subcommand: &str,
        args: &[S],
    ) -> Result<CommandOutput, ProvisionError> {
        self.run(&self.command(subcommand, args), &[]).await
    }

    /// Run a subcommand and parse its stdout as JSON. Empty output is `{}`.
    ///
    /// # Errors
    /// Returns [`ProvisionError::PackageManager`] on a non-zero exit and
    /// [`ProvisionError::InvalidOutput`] when stdout is not JSON.
    pub async fn json<S: AsRef<str>>(
        &self,
        subcommand: &str,
        args: &[S],
    ) -> Result<Value, ProvisionError> {
        let command = self.command(subcommand, args);
        let output = self.run(&command, &[]).await?;
        parse_json(&command, &output.stdout)
    }

    /// Installed packages in scope, as npm's `list` object.
    ///
    /// # Errors
    /// See [`NpmClient::json`].
    pub async fn list(&self, capabilities: &NpmCapabilities) -> Result<Value, ProvisionError> {
        self.json("list", capabilities.list_args()).await
    }

    /// Packages with a newer `wanted` version. Finding some is not a failure.
    ///
    /// # Errors
    /// See [`NpmClient::json`].
    pub async fn outdated(&self) -> Result<Value, ProvisionError> {
        let command = self.command::<&str>("outdated", &[]);
        let output = self.run(&command, &[OUTDATED_FOUND_STATUS]).await?;
        parse_json(&command, &output.stdout)
    }

    /// Registry metadata for `name`.
    ///
    /// # Errors
    /// See [`NpmClient::json`].
    pub async fn show(&self, name: &str) -> Result<Value, ProvisionError> {
        self.json("show", &[name]).await
    }

    /// The npm binary's own version, from `npm version`.
    ///
    /// # Errors
    /// Returns [`ProvisionError::VersionParse`] when the output has no
    /// `npm: '<version>'` line.
    pub async fn version(&self) -> Result<Version, ProvisionError> {
        let command = CommandSpec::new(&self.target.npm_binary)
            .arg("version")
            .user(self.user.clone())
            .group(self.group.clone())
            .envs(&self.target.command_environment())
            .timeout(self.timeout);
        let output = self.run(&command, &[]).await?;
        let version = parse_npm_version(&output.stdout)?;
        debug!("npm at {} is {version}", self.target.npm_binary.display());
        Ok(version)
    }

    /// Version-gated behaviour of this npm.
    ///
    /// # Errors
    /// See [`NpmClient::version`].
    pub async fn capabilities(&self) -> Result<NpmCapabilities, ProvisionError> {
        Ok(NpmCapabilities::new(self.version().await?))
    }
}

fn parse_json(command: &CommandSpec, stdout: &str) -> Result<Value, ProvisionError> {
    if stdout.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(stdout).map_err(|error| ProvisionError::invalid_output(command.display(), error))
}
