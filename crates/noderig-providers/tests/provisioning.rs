use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use noderig_backend::{
    ArchiveFetcher, CollaboratorError, DistUrls, HostInfo, PlatformKey, ProvisionContext,
    ProvisionError, RuntimeProvider, SclPackages, SystemPackages, VersionSpec,
};
use noderig_providers::{InstallState, RuntimeInstallation, default_providers, select_provider};

#[derive(Default)]
struct FetchLog {
    urls: Mutex<Vec<(String, PathBuf)>>,
}

#[async_trait]
impl ArchiveFetcher for FetchLog {
    async fn fetch_and_unpack(&self, url: &str, destination: &Path) -> Result<(), CollaboratorError> {
        self.urls
            .lock()
            .expect("fetch log lock")
            .push((url.to_string(), destination.to_path_buf()));
        Ok(())
    }

    async fn remove(&self, _destination: &Path) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

struct NoPackages;

#[async_trait]
impl SystemPackages for NoPackages {
    async fn install(&self, _candidates: &[&str], _version: Option<&str>) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable("no package manager in tests".to_string()))
    }

    async fn remove(&self, _packages: &[&str]) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn purge(&self, _packages: &[&str]) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[async_trait]
impl SclPackages for NoPackages {
    async fn install(&self, _collection: &str, _devel: Option<&str>) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Unavailable("no collections in tests".to_string()))
    }

    async fn uninstall(&self, _collection: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn environment(&self, _collection: &str) -> Result<BTreeMap<String, String>, CollaboratorError> {
        Ok(BTreeMap::new())
    }
}

fn ubuntu(machine: &str) -> HostInfo {
    HostInfo::new(PlatformKey::new("linux", machine), "ubuntu", "debian", "16.04")
}

fn context(host: HostInfo, fetcher: Arc<FetchLog>) -> ProvisionContext {
    ProvisionContext {
        host,
        install_root: PathBuf::from("/opt"),
        dist_urls: DistUrls::default(),
        fetcher,
        system_packages: Arc::new(NoPackages),
        scl_packages: Arc::new(NoPackages),
    }
}

async fn provision(spec: &str, machine: &str) -> (RuntimeInstallation, Vec<(String, PathBuf)>) {
    let fetcher = Arc::new(FetchLog::default());
    let context = context(ubuntu(machine), fetcher.clone());
    let spec = VersionSpec::new(spec);
    let provider = select_provider(&default_providers(), &spec, &context.host, None)
        .expect("a provider should be eligible");
    let mut installation = RuntimeInstallation::new(provider, spec);
    installation.install(&context).await.expect("install succeeds");
    let urls = fetcher.urls.lock().expect("fetch log lock").clone();
    (installation, urls)
}

#[tokio::test]
async fn blank_spec_installs_preferred_nodejs() {
    let (installation, urls) = provision("", "x86_64").await;

    let handle = installation.handle().expect("installed");
    assert_eq!(handle.provider, "nodejs");
    assert_eq!(handle.version, "8.11.1");
    assert_eq!(handle.binary, PathBuf::from("/opt/nodejs-8.11.1/bin/node"));
    assert_eq!(handle.npm_binary, PathBuf::from("/opt/nodejs-8.11.1/bin/npm"));
    assert_eq!(
        urls,
        vec![(
            "https://nodejs.org/dist/v8.11.1/node-v8.11.1-linux-x64.tar.gz".to_string(),
            PathBuf::from("/opt/nodejs-8.11.1"),
        )]
    );
}

#[tokio::test]
async fn io_js_major_goes_to_iojs() {
    let (installation, urls) = provision("3", "x86_64").await;

    let handle = installation.handle().expect("installed");
    assert_eq!(handle.provider, "iojs");
    assert_eq!(handle.version, "3.3.1");
    assert_eq!(handle.binary, PathBuf::from("/opt/iojs-3.3.1/bin/iojs"));
    assert_eq!(
        urls[0].0,
        "https://iojs.org/dist/v3.3.1/iojs-v3.3.1-linux-x64.tar.gz"
    );
}

#[tokio::test]
async fn tagged_iojs_line_resolves_within_family() {
    let (installation, urls) = provision("iojs-2", "x86_64").await;

    assert_eq!(installation.handle().map(|h| h.version.as_str()), Some("2.5.0"));
    assert_eq!(urls[0].1, PathBuf::from("/opt/iojs-2.5.0"));
}

#[tokio::test]
async fn thirty_two_bit_hosts_get_x86_archives() {
    let (_, urls) = provision("6", "i686").await;

    assert_eq!(
        urls[0].0,
        "https://nodejs.org/dist/v6.14.1/node-v6.14.1-linux-x86.tar.gz"
    );
}

#[test]
fn majors_four_and_up_never_select_iojs() {
    let providers = default_providers();
    for spec in ["4", "4.4", "5", "6", "7", "8", "9"] {
        let provider = select_provider(&providers, &VersionSpec::new(spec), &ubuntu("x86_64"), None)
            .expect("a provider should be eligible");
        assert_eq!(provider.name(), "nodejs", "{spec}");
    }
}

#[test]
fn same_inputs_select_same_provider() {
    let providers = default_providers();
    let first = select_provider(&providers, &VersionSpec::new("0.12"), &ubuntu("x86_64"), None)
        .expect("eligible")
        .name();
    for _ in 0..5 {
        let again = select_provider(&default_providers(), &VersionSpec::new("0.12"), &ubuntu("x86_64"), None)
            .expect("eligible")
            .name();
        assert_eq!(again, first);
    }
}

#[tokio::test]
async fn unmatched_prefix_leaves_failed_state() {
    let fetcher = Arc::new(FetchLog::default());
    let context = context(ubuntu("x86_64"), fetcher.clone());
    let spec = VersionSpec::new("iojs-4");
    let provider = select_provider(&default_providers(), &spec, &context.host, None)
        .expect("iojs is eligible by name");
    assert_eq!(provider.name(), "iojs");

    let mut installation = RuntimeInstallation::new(provider, spec);
    let error = installation.install(&context).await.expect_err("no iojs 4");

    assert!(matches!(error, ProvisionError::NoMatchingVersion { family: "iojs", .. }));
    assert!(matches!(installation.state(), InstallState::Failed(_)));
    assert!(fetcher.urls.lock().expect("fetch log lock").is_empty());
}

#[tokio::test]
async fn dummy_reports_fixed_paths_when_named() {
    let fetcher = Arc::new(FetchLog::default());
    let context = context(ubuntu("x86_64"), fetcher.clone());
    let provider = select_provider(&default_providers(), &VersionSpec::new("8"), &context.host, Some("dummy"))
        .expect("dummy is a provider");

    let handle = provider.handle("8", &context).await.expect("handle builds");

    assert_eq!(handle.binary, PathBuf::from("/node"));
    assert_eq!(handle.npm_binary, PathBuf::from("/npm"));
    assert!(fetcher.urls.lock().expect("fetch log lock").is_empty());
}
