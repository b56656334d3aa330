//! Hand-curated release catalogs.
//!
//! Each catalog lists the preferred (LTS) release first, then the newest patch
//! of every minor line in descending order. Resolution is a prefix match
//! against that order, so it is reproducible and works offline.

use log::debug;

use noderig_backend::{ProvisionError, VersionSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Catalog {
    family: &'static str,
    versions: &'static [&'static str],
}

pub const NODEJS: Catalog = Catalog::new(
    "nodejs",
    &[
        "8.11.1", "9.11.1", "9.10.1", "9.9.0", "9.8.0", "9.7.1", "9.6.1", "9.5.0", "9.4.0",
        "9.3.0", "9.2.1", "9.1.0", "9.0.0", "8.10.0", "8.9.4", "8.8.1", "8.7.0", "8.6.0",
        "8.5.0", "8.4.0", "8.3.0", "8.2.1", "8.1.4", "8.0.0", "7.10.1", "7.9.0", "7.8.0",
        "7.7.4", "7.6.0", "7.5.0", "7.4.0", "7.3.0", "7.2.1", "7.1.0", "7.0.0", "6.14.1",
        "6.13.1", "6.12.3", "6.11.5", "6.10.3", "6.9.5", "6.8.1", "6.7.0", "6.6.0", "6.5.0",
        "6.4.0", "6.3.1", "6.2.2", "6.1.0", "6.0.0", "5.12.0", "5.11.1", "5.10.1", "5.9.1",
        "5.8.0", "5.7.1", "5.6.0", "5.5.0", "5.4.1", "5.3.0", "5.2.0", "5.1.1", "5.0.0",
        "4.9.1", "4.8.7", "4.7.3", "4.6.2", "4.5.0", "4.4.7", "4.3.2", "4.2.6", "4.1.2",
        "4.0.0", "0.12.18", "0.11.16", "0.10.48", "0.9.12", "0.8.28", "0.7.12", "0.6.21",
        "0.5.10",
    ],
);

pub const IOJS: Catalog = Catalog::new(
    "iojs",
    &[
        "3.3.1", "3.2.0", "3.1.0", "3.0.0", "2.5.0", "2.4.0", "2.3.4", "2.2.1", "2.1.0",
        "2.0.2", "1.8.4", "1.7.1", "1.6.4", "1.5.1", "1.4.3", "1.3.0", "1.2.0", "1.1.0",
        "1.0.4",
    ],
);

impl Catalog {
    #[must_use]
    pub const fn new(family: &'static str, versions: &'static [&'static str]) -> Self {
        Self { family, versions }
    }

    #[must_use]
    pub fn family(&self) -> &'static str {
        self.family
    }

    #[must_use]
    pub fn versions(&self) -> &'static [&'static str] {
        self.versions
    }

    /// Resolve an already family-stripped version prefix.
    ///
    /// # Errors
    /// Returns [`ProvisionError::NoMatchingVersion`] when no entry starts with
    /// `prefix`.
    pub fn resolve(&self, prefix: &str) -> Result<&'static str, ProvisionError> {
        let resolved = resolve(prefix, self.versions).ok_or_else(|| {
            ProvisionError::NoMatchingVersion {
                family: self.family,
                spec: prefix.to_string(),
            }
        })?;
        debug!("Resolved {} '{prefix}' to {resolved}", self.family);
        Ok(resolved)
    }

    /// Resolve a user spec, dropping a leading tag naming this catalog's family.
    ///
    /// # Errors
    /// Returns [`ProvisionError::NoMatchingVersion`] when nothing matches.
    pub fn resolve_spec(&self, spec: &VersionSpec) -> Result<&'static str, ProvisionError> {
        self.resolve(spec.without_family(self.family))
            .map_err(|_| ProvisionError::NoMatchingVersion {
                family: self.family,
                spec: spec.to_string(),
            })
    }
}

/// First entry of `versions` starting with `prefix`; the empty prefix picks
/// the first entry.
#[must_use]
pub fn resolve<'a>(prefix: &str, versions: &[&'a str]) -> Option<&'a str> {
    versions
        .iter()
        .find(|version| version.starts_with(prefix))
        .copied()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use noderig_backend::{ProvisionError, VersionSpec};

    use super::{Catalog, IOJS, NODEJS, resolve};

    #[test]
    fn empty_spec_resolves_to_first_entry() {
        assert_eq!(NODEJS.resolve("").unwrap(), "8.11.1");
        assert_eq!(IOJS.resolve("").unwrap(), "3.3.1");
    }

    #[test]
    fn major_prefix_prefers_catalog_order() {
        assert_eq!(NODEJS.resolve("8").unwrap(), "8.11.1");
        assert_eq!(NODEJS.resolve("9").unwrap(), "9.11.1");
        assert_eq!(NODEJS.resolve("0.10").unwrap(), "0.10.48");
        assert_eq!(NODEJS.resolve("0.12").unwrap(), "0.12.18");
    }

    #[test]
    fn full_version_resolves_to_itself() {
        assert_eq!(NODEJS.resolve("8.9.4").unwrap(), "8.9.4");
        assert_eq!(IOJS.resolve("2.4.0").unwrap(), "2.4.0");
    }

    #[test]
    fn family_tagged_specs_are_stripped() {
        assert_eq!(NODEJS.resolve_spec(&VersionSpec::new("nodejs")).unwrap(), "8.11.1");
        assert_eq!(
            NODEJS.resolve_spec(&VersionSpec::new("nodejs-0.10")).unwrap(),
            "0.10.48"
        );
        assert_eq!(IOJS.resolve_spec(&VersionSpec::new("iojs-2")).unwrap(), "2.5.0");
        assert_eq!(IOJS.resolve_spec(&VersionSpec::new("3")).unwrap(), "3.3.1");
    }

    #[test]
    fn unmatched_spec_reports_family_and_spec() {
        let error = IOJS
            .resolve_spec(&VersionSpec::new("iojs-4"))
            .expect_err("io.js never shipped 4.x");

        assert_eq!(
            error,
            ProvisionError::NoMatchingVersion {
                family: "iojs",
                spec: "iojs-4".to_string(),
            }
        );
    }

    #[test]
    fn resolve_returns_first_match_for_every_entry_prefix() {
        for catalog in [NODEJS, IOJS] {
            for (index, version) in catalog.versions().iter().enumerate() {
                let expected = catalog
                    .versions()
                    .iter()
                    .find(|candidate| candidate.starts_with(version))
                    .expect("entry matches itself");
                assert_eq!(resolve(version, catalog.versions()), Some(*expected), "entry {index}");
            }
        }
    }

    #[test]
    fn resolve_on_custom_catalog_is_deterministic() {
        let catalog = Catalog::new("test", &["8.11.1", "7.10.1", "8.9.0"]);
        assert_eq!(catalog.resolve("8").unwrap(), "8.11.1");
        assert_eq!(catalog.resolve("8").unwrap(), catalog.resolve("8").unwrap());
        assert_eq!(catalog.resolve("7").unwrap(), "7.10.1");
        assert!(catalog.resolve("6").is_err());
    }

    #[test]
    fn catalogs_have_one_entry_per_minor_line() {
        for catalog in [NODEJS, IOJS] {
            let mut seen = HashSet::new();
            for version in catalog.versions() {
                let minor = version
                    .rsplit_once('.')
                    .map(|(minor, _)| minor)
                    .expect("catalog entries are full versions");
                assert!(seen.insert(minor), "{minor} listed twice in {}", catalog.family());
            }
        }
    }
}
