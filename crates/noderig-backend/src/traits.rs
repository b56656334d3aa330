use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CollaboratorError, ProvisionError};
use crate::types::{
    CommandOutput, CommandSpec, HostInfo, RuntimeHandle, VersionSpec, sibling_npm,
};

/// Runs external processes. Non-zero exits are reported in the output, not
/// as errors; callers decide which statuses they tolerate.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProvisionError>;
}

/// Downloads a release archive and unpacks it into a directory.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch_and_unpack(&self, url: &str, destination: &Path)
    -> Result<(), CollaboratorError>;

    async fn remove(&self, destination: &Path) -> Result<(), CollaboratorError>;
}

/// The host's native package manager.
#[async_trait]
pub trait SystemPackages: Send + Sync {
    /// Install the first of `candidates` the package manager knows about and
    /// return its name.
    async fn install(
        &self,
        candidates: &[&str],
        version: Option<&str>,
    ) -> Result<String, CollaboratorError>;

    async fn remove(&self, packages: &[&str]) -> Result<(), CollaboratorError>;

    async fn purge(&self, packages: &[&str]) -> Result<(), CollaboratorError>;
}

/// Software collection packaging (`/opt/rh/<collection>`).
#[async_trait]
pub trait SclPackages: Send + Sync {
    async fn install(
        &self,
        collection: &str,
        devel_package: Option<&str>,
    ) -> Result<(), CollaboratorError>;

    async fn uninstall(&self, collection: &str) -> Result<(), CollaboratorError>;

    /// Variables the collection's activation script exports.
    async fn environment(
        &self,
        collection: &str,
    ) -> Result<BTreeMap<String, String>, CollaboratorError>;

    fn root(&self, collection: &str) -> PathBuf {
        Path::new("/opt/rh").join(collection)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistUrls {
    pub nodejs: String,
    pub iojs: String,
}

impl Default for DistUrls {
    fn default() -> Self {
        Self {
            nodejs: "https://nodejs.org/dist".to_string(),
            iojs: "https://iojs.org/dist".to_string(),
        }
    }
}

/// Host facts and collaborators shared by every provider.
#[derive(Clone)]
pub struct ProvisionContext {
    pub host: HostInfo,
    pub install_root: PathBuf,
    pub dist_urls: DistUrls,
    pub fetcher: Arc<dyn ArchiveFetcher>,
    pub system_packages: Arc<dyn SystemPackages>,
    pub scl_packages: Arc<dyn SclPackages>,
}

/// One runtime installation strategy.
#[async_trait]
pub trait RuntimeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this provider should be picked without being named.
    fn auto_eligible(&self, spec: &VersionSpec, host: &HostInfo) -> bool;

    /// Turn the requested spec into the concrete version this provider installs.
    ///
    /// # Errors
    /// Returns an error if nothing this provider ships matches `spec`.
    fn resolve_version(
        &self,
        spec: &VersionSpec,
        context: &ProvisionContext,
    ) -> Result<String, ProvisionError>;

    fn binary_path(&self, version: &str, context: &ProvisionContext) -> PathBuf;

    fn npm_binary(&self, version: &str, context: &ProvisionContext) -> PathBuf {
        sibling_npm(&self.binary_path(version, context))
    }

    async fn environment(
        &self,
        _version: &str,
        _context: &ProvisionContext,
    ) -> Result<BTreeMap<String, String>, ProvisionError> {
        Ok(BTreeMap::new())
    }

    async fn install(&self, version: &str, context: &ProvisionContext) -> Result<(), ProvisionError>;

    async fn uninstall(
        &self,
        version: &str,
        context: &ProvisionContext,
    ) -> Result<(), ProvisionError>;

    /// The output properties for `version` as installed by this provider.
    async fn handle(
        &self,
        version: &str,
        context: &ProvisionContext,
    ) -> Result<RuntimeHandle, ProvisionError> {
        let environment = self.environment(version, context).await?;
        Ok(
            RuntimeHandle::new(self.name(), version, self.binary_path(version, context))
                .with_npm_binary(self.npm_binary(version, context))
                .with_environment(environment),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use async_trait::async_trait;

    use super::*;
    use crate::types::PlatformKey;

    struct NoopFetcher;

    #[async_trait]
    impl ArchiveFetcher for NoopFetcher {
        async fn fetch_and_unpack(&self, _url: &str, _destination: &Path) -> Result<(), CollaboratorError> {
            Ok(())
        }

        async fn remove(&self, _destination: &Path) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    struct NoopSystem;

    #[async_trait]
    impl SystemPackages for NoopSystem {
        async fn install(
            &self,
            candidates: &[&str],
            _version: Option<&str>,
        ) -> Result<String, CollaboratorError> {
            Ok(candidates[0].to_string())
        }

        async fn remove(&self, _packages: &[&str]) -> Result<(), CollaboratorError> {
            Ok(())
        }

        async fn purge(&self, _packages: &[&str]) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    struct NoopScl;

    #[async_trait]
    impl SclPackages for NoopScl {
        async fn install(&self, _collection: &str, _devel: Option<&str>) -> Result<(), CollaboratorError> {
            Ok(())
        }

        async fn uninstall(&self, _collection: &str) -> Result<(), CollaboratorError> {
            Ok(())
        }

        async fn environment(&self, _collection: &str) -> Result<BTreeMap<String, String>, CollaboratorError> {
            Ok(BTreeMap::new())
        }
    }

    struct FixedProvider;

    #[async_trait]
    impl RuntimeProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
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

        fn binary_path(&self, version: &str, _context: &ProvisionContext) -> PathBuf {
            PathBuf::from(format!("/opt/fixed-{version}/bin/node"))
        }

        async fn install(&self, _version: &str, _context: &ProvisionContext) -> Result<(), ProvisionError> {
            Ok(())
        }

        async fn uninstall(&self, _version: &str, _context: &ProvisionContext) -> Result<(), ProvisionError> {
            Ok(())
        }
    }

    fn context() -> ProvisionContext {
        ProvisionContext {
            host: HostInfo::new(PlatformKey::new("linux", "x86_64"), "ubuntu", "debian", "16.04"),
            install_root: PathBuf::from("/opt"),
            dist_urls: DistUrls::default(),
            fetcher: Arc::new(NoopFetcher),
            system_packages: Arc::new(NoopSystem),
            scl_packages: Arc::new(NoopScl),
        }
    }

    #[tokio::test]
    async fn default_handle_uses_sibling_npm_and_empty_environment() {
        let handle = FixedProvider
            .handle("1.0.0", &context())
            .await
            .expect("handle should build");

        assert_eq!(handle.provider, "fixed");
        assert_eq!(handle.binary, PathBuf::from("/opt/fixed-1.0.0/bin/node"));
        assert_eq!(handle.npm_binary, PathBuf::from("/opt/fixed-1.0.0/bin/npm"));
        assert!(handle.environment.is_empty());
    }

    #[test]
    fn default_scl_root_is_under_opt_rh() {
        assert_eq!(NoopScl.root("rh-nodejs4"), PathBuf::from("/opt/rh/rh-nodejs4"));
    }

    #[test]
    fn default_dist_urls_point_at_official_mirrors() {
        let urls = DistUrls::default();
        assert_eq!(urls.nodejs, "https://nodejs.org/dist");
        assert_eq!(urls.iojs, "https://iojs.org/dist");
    }
}
