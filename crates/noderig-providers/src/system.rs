use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, info};

use noderig_backend::{
    CollaboratorError, HostInfo, ProvisionContext, ProvisionError, RuntimeProvider, VersionSpec,
};

const PROVIDER: &str = "system";

/// Package names to try on platforms without a table entry.
pub const SYSTEM_PACKAGE_CANDIDATES: &[&str] = &["nodejs", "nodejs-legacy", "node"];

/// Companion packages Debian splits out of `nodejs`.
const DEBIAN_COMPANIONS: &[&str] = &["npm", "nodejs-legacy"];

/// Runtime packages per platform. An empty list means the base OS ships none.
const PLATFORM_PACKAGES: &[(&str, &[&str])] = &[
    ("debian", &["nodejs"]),
    ("ubuntu", &["nodejs"]),
    ("fedora", &["nodejs"]),
    ("redhat", &[]),
    ("centos", &[]),
    ("amazon", &[]),
];

/// The packages to hand to the OS package manager on `host`.
///
/// # Errors
/// Returns [`ProvisionError::UnsupportedPlatform`] when the platform is known
/// to ship no Node.js package.
pub fn system_packages_for(host: &HostInfo) -> Result<&'static [&'static str], ProvisionError> {
    match PLATFORM_PACKAGES
        .iter()
        .find(|(platform, _)| host.is_platform(platform))
    {
        Some((_, [])) => Err(ProvisionError::UnsupportedPlatform {
            provider: PROVIDER,
            platform: host.to_string(),
        }),
        Some((_, packages)) => Ok(*packages),
        None => Ok(SYSTEM_PACKAGE_CANDIDATES),
    }
}

/// Node.js from the distribution's own packages.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProvider;

impl SystemProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn binary_name(host: &HostInfo) -> &'static str {
    match host.platform.as_str() {
        "ubuntu" if host.platform_version == "12.04" => "node",
        "debian" | "ubuntu" => "nodejs",
        _ => "node",
    }
}

fn version_argument(version: &str) -> Option<&str> {
    (!version.is_empty()).then_some(version)
}

#[async_trait]
impl RuntimeProvider for SystemProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    /// Never on platforms known to lack a package; the static providers cover
    /// those hosts anyway.
    fn auto_eligible(&self, spec: &VersionSpec, host: &HostInfo) -> bool {
        spec.is_numeric_or_empty()
            && !host.is_platform_family("rhel")
            && !host.is_platform("amazon")
    }

    /// The distribution decides the concrete version; an empty result means
    /// whatever it ships by default.
    fn resolve_version(
        &self,
        spec: &VersionSpec,
        _context: &ProvisionContext,
    ) -> Result<String, ProvisionError> {
        Ok(spec.without_family("nodejs").to_string())
    }

    fn binary_path(&self, _version: &str, context: &ProvisionContext) -> PathBuf {
        PathBuf::from("/usr/bin").join(binary_name(&context.host))
    }

    async fn install(&self, version: &str, context: &ProvisionContext) -> Result<(), ProvisionError> {
        let packages = system_packages_for(&context.host)?;
        let failed =
            |source: CollaboratorError| ProvisionError::install_failed(PROVIDER, version, source);

        let installed = context
            .system_packages
            .install(packages, version_argument(version))
            .await
            .map_err(failed)?;
        info!("Installed system package {installed}");

        if context.host.is_platform_family("debian") {
            for &companion in DEBIAN_COMPANIONS {
                context
                    .system_packages
                    .install(&[companion], None)
                    .await
                    .map_err(failed)?;
            }
            debug!("Installed companion packages {}", DEBIAN_COMPANIONS.join(", "));
        }
        Ok(())
    }

    async fn uninstall(
        &self,
        version: &str,
        context: &ProvisionContext,
    ) -> Result<(), ProvisionError> {
        let failed =
            |source: CollaboratorError| ProvisionError::install_failed(PROVIDER, version, source);
        let packages = match system_packages_for(&context.host) {
            Ok(packages) => packages,
            Err(_) => {
                debug!("No system package on {}, nothing to remove", context.host);
                return Ok(());
            }
        };

        context
            .system_packages
            .remove(packages)
            .await
            .map_err(failed)?;
        if context.host.is_platform_family("debian") {
            context
                .system_packages
                .purge(DEBIAN_COMPANIONS)
                .await
                .map_err(failed)?;
        }
        info!("Removed system packages {}", packages.join(", "));
        Ok(())
    }
}
