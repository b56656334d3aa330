use std::path::PathBuf;

use async_trait::async_trait;

use noderig_backend::{HostInfo, ProvisionContext, ProvisionError, RuntimeProvider, VersionSpec};
use noderig_core::{NODEJS, is_supported_machine};

use crate::static_release::StaticRelease;

const RELEASE: StaticRelease = StaticRelease {
    provider: "nodejs",
    artifact: "node",
    binary_name: "node",
    catalog: NODEJS,
};

/// Node.js from the official prebuilt archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeJsProvider;

impl NodeJsProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RuntimeProvider for NodeJsProvider {
    fn name(&self) -> &'static str {
        RELEASE.provider
    }

    /// Also picks up blank and numeric specs, which makes this the default
    /// on supported machines.
    fn auto_eligible(&self, spec: &VersionSpec, host: &HostInfo) -> bool {
        RELEASE.names_family_on_supported_machine(spec, host)
            || (spec.is_numeric_or_empty() && is_supported_machine(&host.key))
    }

    fn resolve_version(
        &self,
        spec: &VersionSpec,
        _context: &ProvisionContext,
    ) -> Result<String, ProvisionError> {
        RELEASE.resolve(spec)
    }

    fn binary_path(&self, version: &str, context: &ProvisionContext) -> PathBuf {
        RELEASE.binary(version, context)
    }

    async fn install(&self, version: &str, context: &ProvisionContext) -> Result<(), ProvisionError> {
        RELEASE
            .install(&context.dist_urls.nodejs, version, context)
            .await
    }

    async fn uninstall(
        &self,
        version: &str,
        context: &ProvisionContext,
    ) -> Result<(), ProvisionError> {
        RELEASE.uninstall(version, context).await
    }
}
