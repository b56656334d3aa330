use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, info};

use noderig_backend::{
    CollaboratorError, HostInfo, ProvisionContext, ProvisionError, RuntimeProvider, VersionSpec,
};

const PROVIDER: &str = "scl";

/// One Node.js software collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SclPackage {
    pub version: &'static str,
    pub collection: &'static str,
    pub devel_package: &'static str,
    /// Lowest distribution major release the collection is published for.
    pub min_platform_major: u32,
    /// Engine collection that has to be present first.
    pub engine: Option<&'static str>,
}

pub const SCL_PACKAGES: &[SclPackage] = &[
    SclPackage {
        version: "4.4.2",
        collection: "rh-nodejs4",
        devel_package: "rh-nodejs4-nodejs-devel",
        min_platform_major: 7,
        engine: None,
    },
    SclPackage {
        version: "0.10.35",
        collection: "nodejs010",
        devel_package: "nodejs010-nodejs-devel",
        min_platform_major: 6,
        engine: Some("v8314"),
    },
];

/// First collection whose version starts with `version` and which is
/// published for the host's distribution release.
#[must_use]
pub fn find_scl_package(version: &str, host: &HostInfo) -> Option<&'static SclPackage> {
    let major = host.platform_major().unwrap_or(0);
    SCL_PACKAGES
        .iter()
        .find(|package| package.version.starts_with(version) && major >= package.min_platform_major)
}

fn package_for_version(version: &str) -> Option<&'static SclPackage> {
    SCL_PACKAGES.iter().find(|package| package.version == version)
}

/// Node.js from Red Hat software collections.
#[derive(Debug, Default, Clone, Copy)]
pub struct SclProvider;

impl SclProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn package(version: &str) -> Result<&'static SclPackage, ProvisionError> {
        package_for_version(version).ok_or_else(|| ProvisionError::NoMatchingVersion {
            family: PROVIDER,
            spec: version.to_string(),
        })
    }
}

#[async_trait]
impl RuntimeProvider for SclProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn auto_eligible(&self, spec: &VersionSpec, host: &HostInfo) -> bool {
        host.key.machine == "x86_64"
            && host.is_platform_family("rhel")
            && !host.is_platform("amazon")
            && find_scl_package(spec.without_family("nodejs"), host).is_some()
    }

    fn resolve_version(
        &self,
        spec: &VersionSpec,
        context: &ProvisionContext,
    ) -> Result<String, ProvisionError> {
        let package = find_scl_package(spec.without_family("nodejs"), &context.host).ok_or_else(
            || ProvisionError::NoMatchingVersion {
                family: PROVIDER,
                spec: spec.to_string(),
            },
        )?;
        debug!(
            "Resolved '{spec}' to collection {} ({})",
            package.collection, package.version
        );
        Ok(package.version.to_string())
    }

    fn binary_path(&self, version: &str, context: &ProvisionContext) -> PathBuf {
        let collection = package_for_version(version).map_or(version, |package| package.collection);
        context
            .scl_packages
            .root(collection)
            .join("root/usr/bin/node")
    }

    async fn environment(
        &self,
        version: &str,
        context: &ProvisionContext,
    ) -> Result<BTreeMap<String, String>, ProvisionError> {
        let package = Self::package(version)?;
        context
            .scl_packages
            .environment(package.collection)
            .await
            .map_err(|source| ProvisionError::install_failed(PROVIDER, version, source))
    }

    async fn install(&self, version: &str, context: &ProvisionContext) -> Result<(), ProvisionError> {
        let package = Self::package(version)?;
        let failed =
            |source: CollaboratorError| ProvisionError::install_failed(PROVIDER, version, source);

        if let Some(engine) = package.engine {
            info!("Installing engine collection {engine}");
            context
                .scl_packages
                .install(engine, None)
                .await
                .map_err(failed)?;
        }
        info!("Installing collection {}", package.collection);
        context
            .scl_packages
            .install(package.collection, Some(package.devel_package))
            .await
            .map_err(failed)
    }

    async fn uninstall(
        &self,
        version: &str,
        context: &ProvisionContext,
    ) -> Result<(), ProvisionError> {
        let package = Self::package(version)?;
        let failed =
            |source: CollaboratorError| ProvisionError::install_failed(PROVIDER, version, source);

        info!("Removing collection {}", package.collection);
        context
            .scl_packages
            .uninstall(package.collection)
            .await
            .map_err(failed)?;
        if let Some(engine) = package.engine {
            info!("Removing engine collection {engine}");
            context
                .scl_packages
                .uninstall(engine)
                .await
                .map_err(failed)?;
        }
        Ok(())
    }
}
