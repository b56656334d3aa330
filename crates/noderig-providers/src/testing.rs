//! Recording fakes for the provider collaborators.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use noderig_backend::{
    ArchiveFetcher, CollaboratorError, DistUrls, HostInfo, PlatformKey, ProvisionContext,
    SclPackages, SystemPackages,
};

fn family_and_version(platform: &str) -> (&'static str, &'static str) {
    match platform {
        "ubuntu" => ("debian", "16.04"),
        "debian" => ("debian", "9"),
        "centos" => ("rhel", "7.3.1611"),
        "redhat" => ("rhel", "7.4"),
        "amazon" => ("amazon", "2017.09"),
        "fedora" => ("fedora", "27"),
        "gentoo" => ("", "2.4.1"),
        _ => ("", ""),
    }
}

pub(crate) fn host_with_version(platform: &str, version: &str, machine: &str) -> HostInfo {
    let (family, _) = family_and_version(platform);
    let family = if family.is_empty() { platform } else { family };
    HostInfo::new(PlatformKey::new("linux", machine), platform, family, version)
}

pub(crate) fn host(platform: &str, machine: &str) -> HostInfo {
    let (_, version) = family_and_version(platform);
    host_with_version(platform, version, machine)
}

/// Records every collaborator call; fails all of them when built with
/// [`Recorder::failing`].
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
    failure: Option<CollaboratorError>,
}

impl Recorder {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(CollaboratorError::Unavailable(message.to_string())),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) -> Result<(), CollaboratorError> {
        self.calls.lock().expect("calls lock").push(call);
        self.failure.clone().map_or(Ok(()), Err)
    }
}

#[async_trait]
impl ArchiveFetcher for Recorder {
    async fn fetch_and_unpack(&self, url: &str, destination: &Path) -> Result<(), CollaboratorError> {
        self.record(format!("fetch {url} -> {}", destination.display()))
    }

    async fn remove(&self, destination: &Path) -> Result<(), CollaboratorError> {
        self.record(format!("remove {}", destination.display()))
    }
}

#[async_trait]
impl SystemPackages for Recorder {
    async fn install(&self, candidates: &[&str], version: Option<&str>) -> Result<String, CollaboratorError> {
        let pin = version.map(|version| format!(" ={version}")).unwrap_or_default();
        self.record(format!("system install {}{pin}", candidates.join(" ")))?;
        Ok(candidates.first().map(ToString::to_string).unwrap_or_default())
    }

    async fn remove(&self, packages: &[&str]) -> Result<(), CollaboratorError> {
        self.record(format!("system remove {}", packages.join(" ")))
    }

    async fn purge(&self, packages: &[&str]) -> Result<(), CollaboratorError> {
        self.record(format!("system purge {}", packages.join(" ")))
    }
}

#[async_trait]
impl SclPackages for Recorder {
    async fn install(&self, collection: &str, devel_package: Option<&str>) -> Result<(), CollaboratorError> {
        let devel = devel_package.map(|devel| format!(" {devel}")).unwrap_or_default();
        self.record(format!("scl install {collection}{devel}"))
    }

    async fn uninstall(&self, collection: &str) -> Result<(), CollaboratorError> {
        self.record(format!("scl uninstall {collection}"))
    }

    async fn environment(&self, collection: &str) -> Result<BTreeMap<String, String>, CollaboratorError> {
        let bin = self.root(collection).join("root/usr/bin");
        Ok(BTreeMap::from([("PATH".to_string(), bin.display().to_string())]))
    }
}

pub(crate) fn context_with(host: HostInfo, recorder: &Recorder) -> ProvisionContext {
    ProvisionContext {
        host,
        install_root: PathBuf::from("/opt"),
        dist_urls: DistUrls::default(),
        fetcher: Arc::new(recorder.clone()),
        system_packages: Arc::new(recorder.clone()),
        scl_packages: Arc::new(recorder.clone()),
    }
}

pub(crate) fn context_for(host: HostInfo) -> ProvisionContext {
    context_with(host, &Recorder::default())
}
