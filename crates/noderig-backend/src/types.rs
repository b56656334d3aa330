use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// A user-supplied runtime version request.
///
/// May be empty (latest), a full version (`8.11.1`), a prefix (`8`, `0.10`)
/// or carry a family name (`iojs`, `iojs-2`, `nodejs-0.10`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionSpec(String);

impl VersionSpec {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the spec is tagged with the given family name.
    #[must_use]
    pub fn names_family(&self, family: &str) -> bool {
        self.0.starts_with(family)
    }

    /// The version part of the spec with a leading family tag removed.
    ///
    /// `iojs-2` becomes `2`, `nodejs` becomes the empty string and untagged
    /// specs are returned as-is.
    #[must_use]
    pub fn without_family(&self, family: &str) -> &str {
        match self.0.strip_prefix(family) {
            Some(rest) => rest.strip_prefix('-').unwrap_or(rest),
            None => &self.0,
        }
    }

    /// Whether the spec is empty or starts with a digit.
    #[must_use]
    pub fn is_numeric_or_empty(&self) -> bool {
        self.0.chars().next().is_none_or(|c| c.is_ascii_digit())
    }

    /// The major component if the spec is `N` or starts with `N.`.
    #[must_use]
    pub fn leading_major(&self) -> Option<u32> {
        let major = self.0.split('.').next()?;
        if major.is_empty() || !major.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        major.parse().ok()
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionSpec {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VersionSpec {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Kernel name and raw machine architecture, e.g. `linux` / `x86_64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformKey {
    pub kernel: String,
    pub machine: String,
}

impl PlatformKey {
    #[must_use]
    pub fn new(kernel: impl Into<String>, machine: impl Into<String>) -> Self {
        Self {
            kernel: kernel.into().to_lowercase(),
            machine: machine.into(),
        }
    }

    /// The `kernel-machine` string used for supported-machine membership.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}-{}", self.kernel, self.machine)
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kernel, self.machine)
    }
}

/// Everything providers need to know about the managed host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub key: PlatformKey,
    /// Distribution id, e.g. `ubuntu`, `centos`, `amazon`, `mac_os_x`.
    pub platform: String,
    /// Distribution family, e.g. `debian`, `rhel`, `fedora`.
    pub platform_family: String,
    pub platform_version: String,
}

impl HostInfo {
    #[must_use]
    pub fn new(
        key: PlatformKey,
        platform: impl Into<String>,
        platform_family: impl Into<String>,
        platform_version: impl Into<String>,
    ) -> Self {
        Self {
            key,
            platform: platform.into(),
            platform_family: platform_family.into(),
            platform_version: platform_version.into(),
        }
    }

    #[must_use]
    pub fn is_platform(&self, platform: &str) -> bool {
        self.platform == platform
    }

    #[must_use]
    pub fn is_platform_family(&self, family: &str) -> bool {
        self.platform_family == family
    }

    #[must_use]
    pub fn platform_major(&self) -> Option<u32> {
        self.platform_version.split('.').next()?.parse().ok()
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.platform, self.platform_version, self.key
        )
    }
}

/// Output contract of an installed runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeHandle {
    pub provider: String,
    pub version: String,
    pub binary: PathBuf,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    pub npm_binary: PathBuf,
}

impl RuntimeHandle {
    /// Build a handle whose npm binary sits next to the runtime binary.
    #[must_use]
    pub fn new(provider: impl Into<String>, version: impl Into<String>, binary: PathBuf) -> Self {
        let npm_binary = sibling_npm(&binary);
        Self {
            provider: provider.into(),
            version: version.into(),
            binary,
            environment: BTreeMap::new(),
            npm_binary,
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_npm_binary(mut self, npm_binary: PathBuf) -> Self {
        self.npm_binary = npm_binary;
        self
    }

    /// Directory holding the runtime binary.
    #[must_use]
    pub fn bin_dir(&self) -> Option<&Path> {
        self.binary.parent()
    }
}

/// The `npm` executable that ships alongside a runtime binary.
#[must_use]
pub fn sibling_npm(binary: &Path) -> PathBuf {
    match binary.parent() {
        Some(dir) => dir.join("npm"),
        None => PathBuf::from("npm"),
    }
}

/// A user or group to run a command as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identity {
    Id(u32),
    Name(String),
}

impl FromStr for Identity {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<u32>()
            .map_or_else(|_| Identity::Name(s.to_string()), Identity::Id))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// A fully described external command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub user: Option<Identity>,
    pub group: Option<Identity>,
    pub environment: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
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
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn envs(mut self, environment: &BTreeMap<String, String>) -> Self {
        self.environment
            .extend(environment.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program and arguments joined for log and error messages.
    #[must_use]
    pub fn display(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}
