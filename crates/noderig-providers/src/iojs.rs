use std::path::PathBuf;

use async_trait::async_trait;

use noderig_backend::{HostInfo, ProvisionContext, ProvisionError, RuntimeProvider, VersionSpec};
use noderig_core::{IOJS, is_supported_machine};

use crate::static_release::StaticRelease;

const RELEASE: StaticRelease = StaticRelease {
    provider: "iojs",
    artifact: "iojs",
    binary_name: "iojs",
    catalog: IOJS,
};

/// Majors only io.js ever released; Node.js resumed numbering at 4.
const IOJS_MAJORS: [u32; 3] = [1, 2, 3];

/// io.js from the official prebuilt archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct IoJsProvider;

impl IoJsProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RuntimeProvider for IoJsProvider {
    fn name(&self) -> &'static str {
        RELEASE.provider
    }

    fn auto_eligible(&self, spec: &VersionSpec, host: &HostInfo) -> bool {
        RELEASE.names_family_on_supported_machine(spec, host)
            || (spec
                .leading_major()
                .is_some_and(|major| IOJS_MAJORS.contains(&major))
                && is_supported_machine(&host.key))
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
        RELEASE.install(&context.dist_urls.iojs, version, context).await
    }

    async fn uninstall(
        &self,
        version: &str,
        context: &ProvisionContext,
    ) -> Result<(), ProvisionError> {
        RELEASE.uninstall(version, context).await
    }
}
