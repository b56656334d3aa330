use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use noderig_backend::{ProvisionError, RuntimeHandle, sibling_npm};

/// The node and npm binaries a package or script operation runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeTarget {
    pub node_binary: PathBuf,
    pub npm_binary: PathBuf,
    pub environment: BTreeMap<String, String>,
}

impl RuntimeTarget {
    /// Pick the binaries for a consumer.
    ///
    /// Node comes from `node`, else the parent runtime, else `node` on
    /// `PATH`. npm comes from `npm`, else the parent runtime, else the
    /// sibling of the chosen node binary.
    ///
    /// # Errors
    /// Returns [`ProvisionError::Io`] when nothing names a node binary and
    /// none is on `PATH`.
    pub fn resolve(
        parent: Option<&RuntimeHandle>,
        node: Option<&Path>,
        npm: Option<&Path>,
    ) -> Result<Self, ProvisionError> {
        let node_binary = match (node, parent) {
            (Some(node), _) => node.to_path_buf(),
            (None, Some(parent)) => parent.binary.clone(),
            (None, None) => which::which("node").map_err(|error| ProvisionError::Io {
                kind: std::io::ErrorKind::NotFound,
                message: format!("node not found on PATH: {error}"),
            })?,
        };
        let npm_binary = match (npm, parent) {
            (Some(npm), _) => npm.to_path_buf(),
            (None, Some(parent)) => parent.npm_binary.clone(),
            (None, None) => sibling_npm(&node_binary),
        };
        let environment = parent.map(|parent| parent.environment.clone()).unwrap_or_default();

        debug!(
            "Using node {} and npm {}",
            node_binary.display(),
            npm_binary.display()
        );
        Ok(Self {
            node_binary,
            npm_binary,
            environment,
        })
    }

    #[must_use]
    pub fn bin_dir(&self) -> Option<&Path> {
        self.node_binary
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    /// `PATH` with the runtime's bin directory in front, so package hooks
    /// find the matching node.
    ///
    /// The runtime's own `PATH` override is the base when it has one,
    /// otherwise `ambient`.
    #[must_use]
    pub fn search_path(&self, ambient: Option<OsString>) -> String {
        let base = self
            .environment
            .get("PATH")
            .map(OsString::from)
            .or(ambient)
            .unwrap_or_default();
        let inherited = (!base.is_empty())
            .then(|| std::env::split_paths(&base))
            .into_iter()
            .flatten();
        let entries = self.bin_dir().map(Path::to_path_buf).into_iter().chain(inherited);

        match std::env::join_paths(entries) {
            Ok(joined) => joined.to_string_lossy().into_owned(),
            Err(error) => {
                warn!("Leaving PATH unchanged: {error}");
                base.to_string_lossy().into_owned()
            }
        }
    }

    /// Environment for npm invocations: the runtime's variables plus the
    /// prefixed `PATH`.
    #[must_use]
    pub fn command_environment(&self) -> BTreeMap<String, String> {
        let mut environment = self.environment.clone();
        environment.insert(
            "PATH".to_string(),
            self.search_path(std::env::var_os("PATH")),
        );
        environment
    }
}

impl From<&RuntimeHandle> for RuntimeTarget {
    fn from(handle: &RuntimeHandle) -> Self {
        Self {
            node_binary: handle.binary.clone(),
            npm_binary: handle.npm_binary.clone(),
            environment: handle.environment.clone(),
        }
    }
}
