use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use noderig_backend::Identity;
use noderig_core::NODEJS_INDEX_URL;
use noderig_npm::PackageAction;

#[derive(Debug, Parser)]
#[command(name = "noderig", version, about = "Provision Node.js runtimes and converge npm packages")]
pub struct Cli {
    /// Log at debug level on the terminal.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Parent directory of static runtime installs.
    #[arg(long, global = true)]
    pub install_root: Option<PathBuf>,

    /// Skip SHA-256 verification of downloaded archives.
    #[arg(long, global = true)]
    pub no_verify: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Install, remove or locate a runtime.
    #[command(subcommand)]
    Runtime(RuntimeCommand),

    /// Converge npm packages.
    Package(PackageArgs),

    /// Run `npm install` for a project directory.
    NpmInstall(NpmInstallArgs),

    /// Run node with the runtime's environment.
    Exec(ExecArgs),

    /// Compare the built-in catalogs with upstream.
    #[command(subcommand)]
    Catalog(CatalogCommand),
}

#[derive(Debug, Subcommand)]
pub enum RuntimeCommand {
    Install(RuntimeArgs),
    Uninstall(RuntimeArgs),
    /// Print the handle a runtime would have, without installing it.
    Which(RuntimeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    /// Provider to use instead of automatic selection.
    #[arg(long)]
    pub provider: Option<String>,

    /// Version spec such as `8`, `0.10`, `iojs-2` or empty for the default.
    #[arg(default_value = "")]
    pub version: String,
}

/// Where package and script operations find node and npm.
#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    /// Use the runtime this version spec resolves to.
    #[arg(long)]
    pub runtime: Option<String>,

    /// Provider for `--runtime`.
    #[arg(long, requires = "runtime")]
    pub provider: Option<String>,

    /// Explicit node binary.
    #[arg(long)]
    pub node: Option<PathBuf>,

    /// Explicit npm binary.
    #[arg(long)]
    pub npm: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    Install,
    Upgrade,
    Remove,
}

impl From<ActionArg> for PackageAction {
    fn from(value: ActionArg) -> Self {
        match value {
            ActionArg::Install => Self::Install,
            ActionArg::Upgrade => Self::Upgrade,
            ActionArg::Remove => Self::Remove,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnsafePermArg {
    True,
    False,
    Unset,
}

impl UnsafePermArg {
    pub fn flag(self) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            Self::Unset => None,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct PackageArgs {
    #[arg(value_enum)]
    pub action: ActionArg,

    /// `name[@version]`; several make a batch.
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Project directory; omitted installs globally.
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Tarball, URL or directory to install instead of registry names.
    #[arg(long)]
    pub source: Option<String>,

    #[arg(long)]
    pub user: Option<Identity>,

    #[arg(long)]
    pub group: Option<Identity>,

    /// Defaults to the `unsafe_perm` setting.
    #[arg(long, value_enum)]
    pub unsafe_perm: Option<UnsafePermArg>,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, Clone, Args)]
pub struct NpmInstallArgs {
    pub dir: PathBuf,

    /// Install devDependencies too.
    #[arg(long)]
    pub development: bool,

    #[arg(long)]
    pub user: Option<Identity>,

    #[arg(long)]
    pub group: Option<Identity>,

    #[arg(long, value_enum)]
    pub unsafe_perm: Option<UnsafePermArg>,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ExecArgs {
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    #[arg(long)]
    pub user: Option<Identity>,

    #[arg(long)]
    pub group: Option<Identity>,

    /// `NAME=VALUE` overrides on top of the runtime environment.
    #[arg(long = "env", value_parser = parse_env_pair)]
    pub environment: Vec<(String, String)>,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Arguments passed to node.
    #[arg(last = true, required = true)]
    pub args: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum CatalogCommand {
    /// Report Node.js catalog entries that drifted from the release index.
    Check {
        #[arg(long, default_value = NODEJS_INDEX_URL)]
        index_url: String,
    },
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}
