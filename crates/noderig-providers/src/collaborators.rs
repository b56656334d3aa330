use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use regex::Regex;

use noderig_backend::{
    CollaboratorError, CommandRunner, CommandSpec, HostInfo, SclPackages, SystemPackages,
};

/// Native package manager front-ends the process-backed collaborators drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageTool {
    Apt,
    Yum,
    Dnf,
}

impl PackageTool {
    #[must_use]
    pub fn for_host(host: &HostInfo) -> Option<Self> {
        match host.platform_family.as_str() {
            "debian" => Some(Self::Apt),
            "rhel" | "amazon" => Some(Self::Yum),
            "fedora" => Some(Self::Dnf),
            _ => None,
        }
    }

    fn installer(self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Yum => "yum",
            Self::Dnf => "dnf",
        }
    }

    /// Query that succeeds only when the repositories know `package`.
    fn probe(self, package: &str) -> CommandSpec {
        match self {
            Self::Apt => CommandSpec::new("apt-cache").args(["show", package]),
            Self::Yum | Self::Dnf => CommandSpec::new(self.installer()).args(["-q", "info", package]),
        }
    }

    fn pinned(self, package: &str, version: Option<&str>) -> String {
        match (self, version) {
            (_, None) => package.to_string(),
            (Self::Apt, Some(version)) => format!("{package}={version}*"),
            (Self::Yum | Self::Dnf, Some(version)) => format!("{package}-{version}"),
        }
    }

    fn install(self, packages: &[String]) -> CommandSpec {
        let spec = CommandSpec::new(self.installer())
            .args(["install", "-y"])
            .args(packages.iter().cloned());
        self.noninteractive(spec)
    }

    fn remove(self, packages: &[&str], purge: bool) -> CommandSpec {
        let verb = match (self, purge) {
            (Self::Apt, true) => "purge",
            _ => "remove",
        };
        let spec = CommandSpec::new(self.installer())
            .args([verb, "-y"])
            .args(packages.iter().copied());
        self.noninteractive(spec)
    }

    fn noninteractive(self, spec: CommandSpec) -> CommandSpec {
        match self {
            Self::Apt => spec.env("DEBIAN_FRONTEND", "noninteractive"),
            Self::Yum | Self::Dnf => spec,
        }
    }
}

async fn run_checked(
    runner: &dyn CommandRunner,
    command: CommandSpec,
) -> Result<String, CollaboratorError> {
    let output = runner.run(&command).await?;
    if output.success() {
        Ok(output.stdout)
    } else {
        Err(CollaboratorError::CommandFailed {
            command: command.display(),
            status: output
                .status
                .map_or_else(|| "signal".to_string(), |code| code.to_string()),
            stderr: output.stderr.trim().to_string(),
        })
    }
}

/// [`SystemPackages`] backed by the host's package manager binary.
#[derive(Clone)]
pub struct CommandSystemPackages {
    runner: Arc<dyn CommandRunner>,
    tool: Option<PackageTool>,
    timeout: Duration,
}

impl CommandSystemPackages {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, host: &HostInfo, timeout: Duration) -> Self {
        Self {
            runner,
            tool: PackageTool::for_host(host),
            timeout,
        }
    }

    fn tool(&self) -> Result<PackageTool, CollaboratorError> {
        self.tool.ok_or_else(|| {
            CollaboratorError::Unavailable("no supported package manager on this platform".to_string())
        })
    }

    async fn known(&self, tool: PackageTool, package: &str) -> bool {
        match self.runner.run(&tool.probe(package)).await {
            Ok(output) => output.success(),
            Err(error) => {
                warn!("Probing package {package} failed: {error}");
                false
            }
        }
    }
}

#[async_trait]
impl SystemPackages for CommandSystemPackages {
    async fn install(
        &self,
        candidates: &[&str],
        version: Option<&str>,
    ) -> Result<String, CollaboratorError> {
        let tool = self.tool()?;
        let mut chosen = None;
        for candidate in candidates {
            if self.known(tool, candidate).await {
                chosen = Some(*candidate);
                break;
            }
            debug!("Package {candidate} is not available");
        }
        let package = chosen.ok_or_else(|| {
            CollaboratorError::Unavailable(format!(
                "none of the packages {} are available",
                candidates.join(", ")
            ))
        })?;

        let command = tool
            .install(&[tool.pinned(package, version)])
            .timeout(Some(self.timeout));
        run_checked(self.runner.as_ref(), command).await?;
        info!("Installed package {package}");
        Ok(package.to_string())
    }

    async fn remove(&self, packages: &[&str]) -> Result<(), CollaboratorError> {
        let tool = self.tool()?;
        let command = tool.remove(packages, false).timeout(Some(self.timeout));
        run_checked(self.runner.as_ref(), command).await.map(drop)
    }

    async fn purge(&self, packages: &[&str]) -> Result<(), CollaboratorError> {
        let tool = self.tool()?;
        let command = tool.remove(packages, true).timeout(Some(self.timeout));
        run_checked(self.runner.as_ref(), command).await.map(drop)
    }
}

/// [`SclPackages`] that installs collections with `yum` and reads their
/// activation scripts from disk.
#[derive(Clone)]
pub struct CommandSclPackages {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl CommandSclPackages {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    fn enable_script(&self, collection: &str) -> PathBuf {
        self.root(collection).join("enable")
    }
}

#[async_trait]
impl SclPackages for CommandSclPackages {
    async fn install(
        &self,
        collection: &str,
        devel_package: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        let mut packages = vec![collection.to_string()];
        packages.extend(devel_package.map(ToString::to_string));
        let command = PackageTool::Yum.install(&packages).timeout(Some(self.timeout));
        run_checked(self.runner.as_ref(), command).await?;
        info!("Installed collection {collection}");
        Ok(())
    }

    async fn uninstall(&self, collection: &str) -> Result<(), CollaboratorError> {
        let command = PackageTool::Yum
            .remove(&[collection], false)
            .timeout(Some(self.timeout));
        run_checked(self.runner.as_ref(), command).await.map(drop)
    }

    async fn environment(
        &self,
        collection: &str,
    ) -> Result<BTreeMap<String, String>, CollaboratorError> {
        let path = self.enable_script(collection);
        let content = tokio::fs::read_to_string(&path).await.map_err(|error| {
            CollaboratorError::Filesystem(format!("failed to read {}: {error}", path.display()))
        })?;
        let inherited: BTreeMap<String, String> = std::env::vars().collect();
        Ok(parse_enable_script(&content, &inherited))
    }
}

static EXPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*export\s+([A-Za-z_][A-Za-z0-9_]*)=(.*)$").expect("export regex")
});

static CONDITIONAL_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*):\+([^}]*)\$\{([A-Za-z_][A-Za-z0-9_]*)\}\}")
        .expect("conditional reference regex")
});

static PLAIN_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("reference regex")
});

/// Evaluate the `export NAME=value` lines of a collection's `enable` script.
///
/// `${VAR:+:${VAR}}` and `$VAR` references are expanded against variables
/// exported earlier in the script, then `inherited`.
#[must_use]
pub fn parse_enable_script(
    content: &str,
    inherited: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut exported: BTreeMap<String, String> = BTreeMap::new();

    for line in content.lines() {
        let Some(captures) = EXPORT_LINE.captures(line) else {
            continue;
        };
        let name = captures[1].to_string();
        let raw = captures[2].trim().trim_matches('"').trim_matches('\'');

        let lookup = |var: &str| -> Option<String> {
            exported
                .get(var)
                .or_else(|| inherited.get(var))
                .filter(|value| !value.is_empty())
                .cloned()
        };

        let conditional = CONDITIONAL_REFERENCE.replace_all(raw, |caps: &regex::Captures| {
            match lookup(&caps[1]) {
                Some(_) => format!("{}{}", &caps[2], lookup(&caps[3]).unwrap_or_default()),
                None => String::new(),
            }
        });
        let value = PLAIN_REFERENCE
            .replace_all(&conditional, |caps: &regex::Captures| {
                let var = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                lookup(var).unwrap_or_default()
            })
            .into_owned();

        debug!("Collection exports {name}={value}");
        exported.insert(name, value);
    }
    exported
}
