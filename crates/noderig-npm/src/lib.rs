//! npm-side operations against a provisioned runtime: package
//! reconciliation, project dependency installs and script execution.

mod capabilities;
mod client;
mod execute;
mod packages;
mod project;
mod target;

pub use capabilities::{Capability, NpmCapabilities, parse_npm_version};
pub use client::NpmClient;
pub use execute::JavascriptExecute;
pub use packages::{
    CurrentVersions, NodePackages, PackageAction, PackageChange, PackageRequest, PackageState,
    Reconciliation, VersionCheck, plan_changes, split_package_spec,
};
pub use project::{PROJECT_INSTALL_TIMEOUT, ProjectInstall};
pub use target::RuntimeTarget;
