//! Runtime installation strategies and the dispatch that picks between them.

mod collaborators;
mod dispatch;
mod dummy;
mod installation;
mod iojs;
mod nodejs;
mod scl;
mod static_release;
mod system;
#[cfg(test)]
mod testing;

pub use collaborators::{CommandSclPackages, CommandSystemPackages, PackageTool, parse_enable_script};
pub use dispatch::{default_providers, select_provider};
pub use dummy::DummyProvider;
pub use installation::{InstallState, RuntimeInstallation};
pub use iojs::IoJsProvider;
pub use nodejs::NodeJsProvider;
pub use scl::{SCL_PACKAGES, SclPackage, SclProvider, find_scl_package};
pub use system::{SYSTEM_PACKAGE_CANDIDATES, SystemProvider, system_packages_for};
