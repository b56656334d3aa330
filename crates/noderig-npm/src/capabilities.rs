use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

use noderig_backend::ProvisionError;

/// npm behaviours that only exist from some release on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// `npm list --depth 0`.
    ShallowList,
    /// `npm outdated --json`.
    Outdated,
}

/// First npm release that has each capability.
const CAPABILITY_TABLE: &[(Capability, (u64, u64, u64))] = &[
    (Capability::ShallowList, (1, 4, 16)),
    (Capability::Outdated, (1, 3, 16)),
];

/// What the npm binary in use can do, derived once from its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpmCapabilities {
    version: Version,
}

impl NpmCapabilities {
    #[must_use]
    pub fn new(version: Version) -> Self {
        Self { version }
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        CAPABILITY_TABLE
            .iter()
            .find(|(entry, _)| *entry == capability)
            .is_some_and(|&(_, (major, minor, patch))| {
                self.version >= Version::new(major, minor, patch)
            })
    }

    /// Extra arguments for the installed-package listing.
    #[must_use]
    pub fn list_args(&self) -> &'static [&'static str] {
        if self.supports(Capability::ShallowList) {
            &["--depth", "0"]
        } else {
            &[]
        }
    }
}

static NPM_VERSION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"npm: '([^']+)'").expect("npm version regex"));

/// Pull npm's own version out of `npm version` output.
///
/// Old releases only print a JS object literal here, so the line
/// `npm: '2.12.1'` is matched rather than parsing JSON.
///
/// # Errors
/// Returns [`ProvisionError::VersionParse`] when the line is missing or the
/// value is not a version.
pub fn parse_npm_version(output: &str) -> Result<Version, ProvisionError> {
    let parse_error = || ProvisionError::VersionParse {
        output: output.to_string(),
    };
    let captured = NPM_VERSION_LINE
        .captures(output)
        .and_then(|captures| captures.get(1))
        .ok_or_else(parse_error)?;
    Version::parse(captured.as_str()).map_err(|_| parse_error())
}
