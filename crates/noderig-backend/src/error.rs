use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("No {family} version matches '{spec}'")]
    NoMatchingVersion { family: &'static str, spec: String },

    #[error("No runtime provider available for version '{spec}' on {platform}")]
    NoProviderAvailable { spec: String, platform: String },

    #[error("Unknown runtime provider: {name}")]
    UnknownProvider { name: String },

    #[error("Provider {provider} does not support platform {platform}")]
    UnsupportedPlatform {
        provider: &'static str,
        platform: String,
    },

    #[error("Failed to fetch {url} for {provider} {version}: {source}")]
    ArtifactFetch {
        provider: &'static str,
        version: String,
        url: String,
        source: CollaboratorError,
    },

    #[error("Installation of {provider} {version} failed: {source}")]
    InstallFailed {
        provider: &'static str,
        version: String,
        source: CollaboratorError,
    },

    #[error("Package manager command `{command}` failed ({}): {stderr}", status_label(.status))]
    PackageManager {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Unable to parse npm version from {output:?}")]
    VersionParse { output: String },

    #[error("Unexpected output from `{command}`: {details}")]
    InvalidOutput { command: String, details: String },

    #[error("Command `{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("IO error ({kind}): {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },
}

/// Failure reported by an [`ArchiveFetcher`](crate::ArchiveFetcher),
/// [`SystemPackages`](crate::SystemPackages) or [`SclPackages`](crate::SclPackages)
/// implementation. Providers wrap it with their name and version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The archive or its checksum manifest could not be fetched or verified.
    #[error("{0}")]
    Download(String),

    /// The archive was fetched but could not be unpacked. Whatever was already
    /// written stays in place.
    #[error("{0}")]
    Unpack(String),

    #[error("{0}")]
    Filesystem(String),

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Nothing on this host can perform the request.
    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Runner(Box<ProvisionError>),
}

impl From<ProvisionError> for CollaboratorError {
    fn from(err: ProvisionError) -> Self {
        Self::Runner(Box::new(err))
    }
}

#[allow(clippy::ref_option)]
fn status_label(status: &Option<i32>) -> String {
    status.map_or_else(|| "terminated by signal".to_string(), |code| format!("exit {code}"))
}

impl ProvisionError {
    pub fn install_failed(
        provider: &'static str,
        version: impl Into<String>,
        source: CollaboratorError,
    ) -> Self {
        Self::InstallFailed {
            provider,
            version: version.into(),
            source,
        }
    }

    pub fn artifact_fetch(
        provider: &'static str,
        version: impl Into<String>,
        url: impl Into<String>,
        source: CollaboratorError,
    ) -> Self {
        Self::ArtifactFetch {
            provider,
            version: version.into(),
            url: url.into(),
            source,
        }
    }

    pub fn invalid_output<E>(command: impl Into<String>, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::InvalidOutput {
            command: command.into(),
            details: error.to_string(),
        }
    }
}

impl From<std::io::Error> for ProvisionError {
    fn from(err: std::io::Error) -> Self {
        ProvisionError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
