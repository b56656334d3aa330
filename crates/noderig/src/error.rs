use thiserror::Error;

use noderig_backend::ProvisionError;
use noderig_core::{ArchiveError, MetadataError};
use noderig_platform::AppPathsError;

use crate::run_lock::AcquireError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("failed to resolve application paths: {0}")]
    Paths(#[from] AppPathsError),

    #[error(transparent)]
    Lock(#[from] AcquireError),

    #[error("failed to set up downloads: {0}")]
    Archive(#[from] ArchiveError),

    #[error("catalog check failed: {0}")]
    Metadata(#[from] MetadataError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}
