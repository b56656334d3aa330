//! Release knowledge shared by the runtime providers.
//!
//! - Version catalogs for Node.js and io.js, and prefix resolution against them.
//! - Release archive naming (machine labels and supported machines).
//! - HTTP download, checksum verification and unpacking of release tarballs.
//! - Freshness check of the built-in catalogs against the upstream release index.

mod archive;
pub mod catalog;
mod machine;
mod metadata;

/// Release tarball fetcher backed by `reqwest`.
pub use archive::{ArchiveError, HttpArchiveFetcher};
/// Built-in catalogs and prefix resolution.
pub use catalog::{Catalog, IOJS, NODEJS, resolve};
/// Archive architecture labels.
pub use machine::{MACHINE_LABELS, SUPPORTED_MACHINES, is_supported_machine, machine_label};
/// Release index model and catalog freshness check.
pub use metadata::{
    CatalogDrift, MetadataError, NODEJS_INDEX_URL, ReleaseEntry, check_catalog_freshness,
    desired_catalog, fetch_release_index,
};
