use std::sync::Arc;

use log::{debug, info};

use noderig_backend::{HostInfo, ProvisionError, RuntimeProvider, VersionSpec};

use crate::dummy::DummyProvider;
use crate::iojs::IoJsProvider;
use crate::nodejs::NodeJsProvider;
use crate::scl::SclProvider;
use crate::system::SystemProvider;

/// Every provider, most preferred first.
#[must_use]
pub fn default_providers() -> Vec<Arc<dyn RuntimeProvider>> {
    vec![
        Arc::new(IoJsProvider::new()),
        Arc::new(NodeJsProvider::new()),
        Arc::new(SclProvider::new()),
        Arc::new(SystemProvider::new()),
        Arc::new(DummyProvider::new()),
    ]
}

/// Pick the provider for `spec` on `host`.
///
/// A named provider is used as-is without consulting eligibility. Otherwise
/// the first auto-eligible provider in `providers` order wins.
///
/// # Errors
/// Returns [`ProvisionError::UnknownProvider`] for a name not in `providers`
/// and [`ProvisionError::NoProviderAvailable`] when nothing is eligible.
pub fn select_provider(
    providers: &[Arc<dyn RuntimeProvider>],
    spec: &VersionSpec,
    host: &HostInfo,
    explicit: Option<&str>,
) -> Result<Arc<dyn RuntimeProvider>, ProvisionError> {
    if let Some(name) = explicit {
        debug!("Provider {name} requested explicitly");
        return providers
            .iter()
            .find(|provider| provider.name() == name)
            .cloned()
            .ok_or_else(|| ProvisionError::UnknownProvider {
                name: name.to_string(),
            });
    }

    let provider = providers
        .iter()
        .find(|provider| provider.auto_eligible(spec, host))
        .cloned()
        .ok_or_else(|| ProvisionError::NoProviderAvailable {
            spec: spec.to_string(),
            platform: host.to_string(),
        })?;
    info!("Selected provider {} for '{spec}' on {host}", provider.name());
    Ok(provider)
}
