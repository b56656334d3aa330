//! Package state reconciliation against an npm install scope.
//!
//! One pass lists what is installed, asks `npm outdated` for upgrade targets
//! when a requested package is already present, falls back to `npm show` for
//! everything else, and only then issues at most one mutating npm call.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use serde::Serialize;
use serde_json::Value;

use noderig_backend::{CommandRunner, Identity, ProvisionError};

use crate::capabilities::Capability;
use crate::client::NpmClient;
use crate::target::RuntimeTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageAction {
    Install,
    Upgrade,
    Remove,
}

impl FromStr for PackageAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(Self::Install),
            "upgrade" => Ok(Self::Upgrade),
            "remove" => Ok(Self::Remove),
            other => Err(format!("unsupported package action '{other}'")),
        }
    }
}

impl fmt::Display for PackageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::Remove => "remove",
        })
    }
}

/// Split `name@version`, keeping the leading `@` of scoped names.
#[must_use]
pub fn split_package_spec(spec: &str) -> (&str, Option<&str>) {
    match spec.rfind('@') {
        Some(at) if at > 0 => {
            let version = &spec[at + 1..];
            (&spec[..at], (!version.is_empty()).then_some(version))
        }
        _ => (spec, None),
    }
}

/// One or more packages to converge in one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    names: Vec<String>,
    versions: Vec<Option<String>>,
    batch: bool,
    /// Project directory; `None` installs globally.
    pub path: Option<PathBuf>,
    pub user: Option<Identity>,
    pub group: Option<Identity>,
    /// `--unsafe-perm <value>`; `None` leaves the flag off entirely.
    pub unsafe_perm: Option<bool>,
    /// Tarball, URL or directory to install instead of the registry names.
    pub source: Option<String>,
}

impl PackageRequest {
    #[must_use]
    pub fn single(name: impl Into<String>) -> Self {
        Self::with_names(vec![name.into()], false)
    }

    #[must_use]
    pub fn batch<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_names(names.into_iter().map(Into::into).collect(), true)
    }

    fn with_names(names: Vec<String>, batch: bool) -> Self {
        let versions = vec![None; names.len()];
        Self {
            names,
            versions,
            batch,
            path: None,
            user: None,
            group: None,
            unsafe_perm: Some(true),
            source: None,
        }
    }

    /// Build from `name[@version]` arguments. A single argument is a single
    /// request, several make a batch.
    #[must_use]
    pub fn from_specs<S: AsRef<str>>(specs: &[S]) -> Self {
        let (names, versions): (Vec<&str>, Vec<Option<&str>>) =
            specs.iter().map(|spec| split_package_spec(spec.as_ref())).unzip();
        let request = if names.len() == 1 {
            Self::single(names[0])
        } else {
            Self::batch(names)
        };
        request.versions(versions.into_iter().map(|version| version.map(str::to_string)).collect())
    }

    /// Desired versions, positionally matching the names. Missing trailing
    /// entries mean "no preference".
    #[must_use]
    pub fn versions(mut self, mut versions: Vec<Option<String>>) -> Self {
        versions.resize(self.names.len(), None);
        self.versions = versions;
        self
    }

    #[must_use]
    pub fn version(self, version: impl Into<String>) -> Self {
        self.versions(vec![Some(version.into())])
    }

    #[must_use]
    pub fn path(mut self, path: Option<PathBuf>) -> Self {
        self.path = path;
        self
    }

    #[must_use]
    pub fn user(mut self, user: Option<Identity>) -> Self {
        self.user = user;
        self
    }

    #[must_use]
    pub fn group(mut self, group: Option<Identity>) -> Self {
        self.group = group;
        self
    }

    #[must_use]
    pub fn unsafe_perm(mut self, unsafe_perm: Option<bool>) -> Self {
        self.unsafe_perm = unsafe_perm;
        self
    }

    #[must_use]
    pub fn source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn is_batch(&self) -> bool {
        self.batch
    }

    #[must_use]
    pub fn version_at(&self, index: usize) -> Option<&str> {
        self.versions.get(index).and_then(Option::as_deref)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageState {
    /// Installed casing when present, otherwise the registry's or the request's.
    pub name: String,
    pub current: Option<String>,
    pub candidate: Option<String>,
}

impl PackageState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            current: None,
            candidate: None,
        }
    }
}

/// Current version field as the request shape sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CurrentVersions {
    Single(Option<String>),
    /// Positional; packages that are not installed stay as `None`.
    Batch(Vec<Option<String>>),
}

/// Result of the read-only part of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionCheck {
    /// One entry per requested name, in request order.
    pub requested: Vec<PackageState>,
    /// Everything the pass learned about the scope, keyed by lowercase name.
    pub scope: BTreeMap<String, PackageState>,
    #[serde(skip)]
    batch: bool,
}

impl VersionCheck {
    #[must_use]
    pub fn current_versions(&self) -> CurrentVersions {
        let mut current = self.requested.iter().map(|state| state.current.clone());
        if self.batch {
            CurrentVersions::Batch(current.collect())
        } else {
            CurrentVersions::Single(current.next().flatten())
        }
    }

    #[must_use]
    pub fn candidate_versions(&self) -> Vec<Option<String>> {
        self.requested
            .iter()
            .map(|state| state.candidate.clone())
            .collect()
    }
}

/// One package a mutating call touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageChange {
    pub name: String,
    pub version: Option<String>,
}

impl PackageChange {
    fn install_arg(&self) -> String {
        match &self.version {
            Some(version) => format!("{}@{version}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub action: PackageAction,
    pub check: VersionCheck,
    pub changes: Vec<PackageChange>,
}

impl Reconciliation {
    #[must_use]
    pub fn updated(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Node packages managed through one runtime's npm.
#[derive(Clone)]
pub struct NodePackages {
    runner: Arc<dyn CommandRunner>,
    target: RuntimeTarget,
    timeout: Option<Duration>,
}

impl NodePackages {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, target: RuntimeTarget) -> Self {
        Self {
            runner,
            target,
            timeout: None,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn client(&self, request: &PackageRequest) -> NpmClient {
        NpmClient::new(self.runner.clone(), self.target.clone())
            .path(request.path.clone())
            .user(request.user.clone())
            .group(request.group.clone())
            .timeout(self.timeout)
    }

    /// Current and candidate versions of every requested package.
    ///
    /// Calls are strictly ordered: `version`, `list`, then `outdated` (only
    /// when a requested package is installed and npm supports it), then one
    /// `show` per requested package still lacking a candidate.
    ///
    /// # Errors
    /// Returns the first npm failure. A failed `version` stops the pass
    /// before anything else runs.
    pub async fn check_package_versions(
        &self,
        request: &PackageRequest,
    ) -> Result<VersionCheck, ProvisionError> {
        let client = self.client(request);
        let capabilities = client.capabilities().await?;

        let mut scope: BTreeMap<String, PackageState> = BTreeMap::new();
        let listing = client.list(&capabilities).await?;
        if let Some(dependencies) = listing.get("dependencies").and_then(Value::as_object) {
            for (name, data) in dependencies {
                let mut state = PackageState::new(name);
                state.current = string_field(data, "version");
                scope.insert(name.to_lowercase(), state);
            }
        }
        debug!("{} packages installed in scope", scope.len());

        let keys: Vec<String> = request.names().iter().map(|name| name.to_lowercase()).collect();
        let any_installed = keys.iter().any(|key| scope.contains_key(key));
        if any_installed && capabilities.supports(Capability::Outdated) {
            let outdated = client.outdated().await?;
            let wanted: BTreeMap<String, &Value> = outdated
                .as_object()
                .map(|entries| {
                    entries
                        .iter()
                        .map(|(name, data)| (name.to_lowercase(), data))
                        .collect()
                })
                .unwrap_or_default();
            for (key, state) in &mut scope {
                state.candidate = match wanted.get(key) {
                    Some(data) => string_field(data, "wanted"),
                    None => state.current.clone(),
                };
            }
        }

        for (key, name) in keys.iter().zip(request.names()) {
            let state = scope
                .entry(key.clone())
                .or_insert_with(|| PackageState::new(name));
            if state.candidate.is_none() {
                let shown = client.show(name).await?;
                state.candidate = string_field(&shown, "version");
                if state.current.is_none()
                    && let Some(registry_name) = string_field(&shown, "name")
                {
                    state.name = registry_name;
                }
            }
        }

        let requested = keys
            .iter()
            .zip(request.names())
            .map(|(key, name)| {
                scope
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| PackageState::new(name))
            })
            .collect();
        Ok(VersionCheck {
            requested,
            scope,
            batch: request.is_batch(),
        })
    }

    /// Install `changes`, or the request's source in their place.
    ///
    /// # Errors
    /// Returns [`ProvisionError::PackageManager`] when npm fails.
    pub async fn install_packages(
        &self,
        request: &PackageRequest,
        changes: &[PackageChange],
    ) -> Result<(), ProvisionError> {
        let mut args = Vec::new();
        if let Some(unsafe_perm) = request.unsafe_perm {
            args.push("--unsafe-perm".to_string());
            args.push(unsafe_perm.to_string());
        }
        match &request.source {
            Some(source) => args.push(source.clone()),
            None => args.extend(changes.iter().map(PackageChange::install_arg)),
        }
        self.client(request).execute("install", args.as_slice()).await.map(drop)
    }

    /// npm upgrades by installing over the existing version.
    ///
    /// # Errors
    /// See [`NodePackages::install_packages`].
    pub async fn upgrade_packages(
        &self,
        request: &PackageRequest,
        changes: &[PackageChange],
    ) -> Result<(), ProvisionError> {
        self.install_packages(request, changes).await
    }

    /// Uninstall by name; versions play no part.
    ///
    /// # Errors
    /// Returns [`ProvisionError::PackageManager`] when npm fails.
    pub async fn remove_packages(
        &self,
        request: &PackageRequest,
        changes: &[PackageChange],
    ) -> Result<(), ProvisionError> {
        let names: Vec<&str> = changes.iter().map(|change| change.name.as_str()).collect();
        self.client(request).execute("uninstall", names.as_slice()).await.map(drop)
    }

    /// Run one full pass: check versions, then issue at most one mutating
    /// call for the packages that need it.
    ///
    /// # Errors
    /// Returns the first npm failure of either phase.
    pub async fn reconcile(
        &self,
        action: PackageAction,
        request: &PackageRequest,
    ) -> Result<Reconciliation, ProvisionError> {
        let check = self.check_package_versions(request).await?;
        let changes = plan_changes(action, request, &check);

        if changes.is_empty() {
            debug!("Packages already converged for {action}");
        } else {
            let names: Vec<String> = changes.iter().map(PackageChange::install_arg).collect();
            info!("npm {action}: {}", names.join(" "));
            match action {
                PackageAction::Install => self.install_packages(request, &changes).await?,
                PackageAction::Upgrade => self.upgrade_packages(request, &changes).await?,
                PackageAction::Remove => self.remove_packages(request, &changes).await?,
            }
        }

        Ok(Reconciliation {
            action,
            check,
            changes,
        })
    }
}

/// Packages whose current state differs from what `action` asks for.
#[must_use]
pub fn plan_changes(
    action: PackageAction,
    request: &PackageRequest,
    check: &VersionCheck,
) -> Vec<PackageChange> {
    check
        .requested
        .iter()
        .enumerate()
        .filter_map(|(index, state)| {
            let desired = request.version_at(index);
            let current = state.current.as_deref();
            let target = desired.or(state.candidate.as_deref());
            let needed = match action {
                PackageAction::Install => {
                    current.is_none() || desired.is_some_and(|desired| current != Some(desired))
                }
                PackageAction::Upgrade => target.is_some() && current != target,
                PackageAction::Remove => {
                    current.is_some() && desired.is_none_or(|desired| current == Some(desired))
                }
            };
            needed.then(|| PackageChange {
                name: state.name.clone(),
                version: match action {
                    PackageAction::Remove => None,
                    PackageAction::Install | PackageAction::Upgrade => target.map(str::to_string),
                },
            })
        })
        .collect()
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}
