use std::path::PathBuf;

use log::{debug, info};

use noderig_backend::{HostInfo, PlatformKey, ProvisionContext, ProvisionError, VersionSpec};
use noderig_core::{Catalog, is_supported_machine, machine_label};

/// Shared mechanics of the providers that unpack a prebuilt release archive
/// into `<install_root>/<family>-<version>`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StaticRelease {
    pub provider: &'static str,
    /// Archive name prefix, e.g. `node` in `node-v8.11.1-linux-x64.tar.gz`.
    pub artifact: &'static str,
    pub binary_name: &'static str,
    pub catalog: Catalog,
}

impl StaticRelease {
    /// Eligible when the spec names this family and archives exist for the host.
    pub fn names_family_on_supported_machine(&self, spec: &VersionSpec, host: &HostInfo) -> bool {
        spec.names_family(self.catalog.family()) && is_supported_machine(&host.key)
    }

    /// Resolve against the catalog. A fully pinned `x.y.z` the catalog does not
    /// list (an older patch of a minor line) is used as given.
    pub fn resolve(&self, spec: &VersionSpec) -> Result<String, ProvisionError> {
        match self.catalog.resolve_spec(spec) {
            Ok(version) => Ok(version.to_string()),
            Err(error) => {
                let requested = spec.without_family(self.catalog.family());
                if is_full_version(requested) {
                    debug!("{requested} is not catalogued, pinning it as requested");
                    Ok(requested.to_string())
                } else {
                    Err(error)
                }
            }
        }
    }

    pub fn folder(&self, version: &str, context: &ProvisionContext) -> PathBuf {
        context
            .install_root
            .join(format!("{}-{version}", self.catalog.family()))
    }

    pub fn binary(&self, version: &str, context: &ProvisionContext) -> PathBuf {
        self.folder(version, context)
            .join("bin")
            .join(self.binary_name)
    }

    pub fn url(&self, base: &str, version: &str, key: &PlatformKey) -> String {
        format!(
            "{}/v{version}/{}-v{version}-{}-{}.tar.gz",
            base.trim_end_matches('/'),
            self.artifact,
            key.kernel,
            machine_label(key)
        )
    }

    pub async fn install(
        &self,
        base: &str,
        version: &str,
        context: &ProvisionContext,
    ) -> Result<(), ProvisionError> {
        let url = self.url(base, version, &context.host.key);
        let folder = self.folder(version, context);
        info!(
            "Installing {} {version} from {url} into {}",
            self.provider,
            folder.display()
        );

        context
            .fetcher
            .fetch_and_unpack(&url, &folder)
            .await
            .map_err(|source| ProvisionError::artifact_fetch(self.provider, version, url, source))
    }

    pub async fn uninstall(
        &self,
        version: &str,
        context: &ProvisionContext,
    ) -> Result<(), ProvisionError> {
        let folder = self.folder(version, context);
        debug!("Removing {} {version} at {}", self.provider, folder.display());
        context
            .fetcher
            .remove(&folder)
            .await
            .map_err(|source| ProvisionError::install_failed(self.provider, version, source))
    }
}

fn is_full_version(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}
