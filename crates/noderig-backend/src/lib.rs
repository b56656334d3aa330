mod error;
mod traits;
mod types;

pub use error::{CollaboratorError, ProvisionError};
pub use traits::{
    ArchiveFetcher, CommandRunner, DistUrls, ProvisionContext, RuntimeProvider, SclPackages,
    SystemPackages,
};
pub use types::{
    CommandOutput, CommandSpec, HostInfo, Identity, PlatformKey, RuntimeHandle, VersionSpec,
    sibling_npm,
};
