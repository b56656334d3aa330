use std::path::PathBuf;

use async_trait::async_trait;
use log::debug;

use noderig_backend::{HostInfo, ProvisionContext, ProvisionError, RuntimeProvider, VersionSpec};

/// Installs nothing and reports fixed paths. Only used when named explicitly.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyProvider;

impl DummyProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RuntimeProvider for DummyProvider {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn auto_eligible(&self, _spec: &VersionSpec, _host: &HostInfo) -> bool {
        false
    }

    fn resolve_version(
        &self,
        spec: &VersionSpec,
        _context: &ProvisionContext,
    ) -> Result<String, ProvisionError> {
        Ok(spec.to_string())
    }

    fn binary_path(&self, _version: &str, _context: &ProvisionContext) -> PathBuf {
        PathBuf::from("/node")
    }

    fn npm_binary(&self, _version: &str, _context: &ProvisionContext) -> PathBuf {
        PathBuf::from("/npm")
    }

    async fn install(&self, version: &str, _context: &ProvisionContext) -> Result<(), ProvisionError> {
        debug!("dummy install of '{version}'");
        Ok(())
    }

    async fn uninstall(
        &self,
        version: &str,
        _context: &ProvisionContext,
    ) -> Result<(), ProvisionError> {
        debug!("dummy uninstall of '{version}'");
        Ok(())
    }
}
