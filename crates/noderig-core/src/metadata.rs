use std::collections::HashSet;

use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;

use crate::catalog::Catalog;

pub const NODEJS_INDEX_URL: &str = "https://nodejs.org/dist/index.json";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to fetch release index: {0}")]
    Fetch(#[source] reqwest::Error),
    #[error("Release index request failed with status {0}")]
    Status(reqwest::StatusCode),
    #[error("Failed to parse release index: {0}")]
    Parse(#[source] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum Lts {
    Flag(bool),
    Codename(String),
}

impl Lts {
    fn is_lts(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Codename(_) => true,
        }
    }
}

/// One row of the upstream release index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseEntry {
    pub version: String,
    #[serde(default = "not_lts")]
    lts: Lts,
}

fn not_lts() -> Lts {
    Lts::Flag(false)
}

impl ReleaseEntry {
    #[must_use]
    pub fn new(version: impl Into<String>, lts: Option<&str>) -> Self {
        Self {
            version: version.into(),
            lts: lts.map_or(Lts::Flag(false), |name| Lts::Codename(name.to_string())),
        }
    }

    #[must_use]
    pub fn is_lts(&self) -> bool {
        self.lts.is_lts()
    }

    fn bare_version(&self) -> &str {
        self.version.trim_start_matches('v')
    }
}

fn minor_line(version: &str) -> &str {
    version.rsplit_once('.').map_or(version, |(minor, _)| minor)
}

/// Build the catalog the index implies: the newest LTS release first, then
/// the newest patch of every minor line in index order.
#[must_use]
pub fn desired_catalog(entries: &[ReleaseEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut versions: Vec<String> = entries
        .iter()
        .map(ReleaseEntry::bare_version)
        .filter(|version| seen.insert(minor_line(*version)))
        .map(ToString::to_string)
        .collect();

    if let Some(lts) = entries.iter().find(|entry| entry.is_lts()) {
        let lts = lts.bare_version();
        versions.retain(|version| version != lts);
        versions.insert(0, lts.to_string());
    }
    versions
}

/// Difference between a built-in catalog and what the release index implies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDrift {
    pub expected_first: Option<String>,
    pub actual_first: Option<String>,
    /// Wanted by the index but absent from the catalog.
    pub missing: Vec<String>,
    /// In the catalog but superseded or unknown to the index.
    pub outdated: Vec<String>,
}

impl CatalogDrift {
    #[must_use]
    pub fn compare(catalog: &[&str], desired: &[String]) -> Self {
        let current: HashSet<&str> = catalog.iter().copied().collect();
        let wanted: HashSet<&str> = desired.iter().map(String::as_str).collect();

        Self {
            expected_first: desired.first().cloned(),
            actual_first: catalog.first().map(ToString::to_string),
            missing: desired
                .iter()
                .filter(|version| !current.contains(version.as_str()))
                .cloned()
                .collect(),
            outdated: catalog
                .iter()
                .filter(|version| !wanted.contains(*version))
                .map(ToString::to_string)
                .collect(),
        }
    }

    #[must_use]
    pub fn is_current(&self) -> bool {
        self.expected_first == self.actual_first && self.missing.is_empty() && self.outdated.is_empty()
    }
}

/// Fetch the release index.
///
/// # Errors
/// Returns an error when the request fails or the body is not the expected JSON.
pub async fn fetch_release_index(
    client: &reqwest::Client,
    index_url: &str,
) -> Result<Vec<ReleaseEntry>, MetadataError> {
    debug!("Fetching release index from {index_url}");
    let response = client
        .get(index_url)
        .send()
        .await
        .map_err(MetadataError::Fetch)?;
    if !response.status().is_success() {
        return Err(MetadataError::Status(response.status()));
    }

    let entries: Vec<ReleaseEntry> = response.json().await.map_err(MetadataError::Parse)?;
    debug!("Release index lists {} versions", entries.len());
    Ok(entries)
}

/// Compare `catalog` against the live release index.
///
/// # Errors
/// Returns an error when the index cannot be fetched or parsed.
pub async fn check_catalog_freshness(
    client: &reqwest::Client,
    index_url: &str,
    catalog: &Catalog,
) -> Result<CatalogDrift, MetadataError> {
    let entries = fetch_release_index(client, index_url).await?;
    let drift = CatalogDrift::compare(catalog.versions(), &desired_catalog(&entries));
    if drift.is_current() {
        info!("{} catalog is up to date", catalog.family());
    } else {
        info!(
            "{} catalog drifted: {} missing, {} outdated",
            catalog.family(),
            drift.missing.len(),
            drift.outdated.len()
        );
    }
    Ok(drift)
}
