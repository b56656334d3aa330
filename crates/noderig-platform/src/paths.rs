use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Roots every noderig directory under one path, e.g. for system-wide runs.
pub const HOME_ENV: &str = "NODERIG_HOME";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no per-user {0} directory; set {HOME_ENV} to choose one")]
pub struct AppPathsError(&'static str);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// `$NODERIG_HOME` when set, otherwise the platform's per-user
    /// directories.
    ///
    /// # Errors
    /// Returns an error when the override is unset and the platform has no
    /// per-user directory of some kind.
    pub fn new() -> Result<Self, AppPathsError> {
        Self::from_override(std::env::var_os(HOME_ENV))
    }

    fn from_override(root: Option<OsString>) -> Result<Self, AppPathsError> {
        match root {
            Some(root) if !root.is_empty() => Ok(Self::rooted_at(Path::new(&root))),
            _ => Self::per_user(),
        }
    }

    #[must_use]
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            cache_dir: root.join("cache"),
            data_dir: root.join("data"),
        }
    }

    fn per_user() -> Result<Self, AppPathsError> {
        let base = |dir: Option<PathBuf>, kind: &'static str| {
            dir.map(|dir| dir.join("noderig"))
                .ok_or(AppPathsError(kind))
        };
        Ok(Self {
            config_dir: base(dirs::config_dir(), "config")?,
            cache_dir: base(dirs::cache_dir(), "cache")?,
            data_dir: base(dirs::data_dir(), "data")?,
        })
    }

    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    /// Where release tarballs are staged before unpacking.
    #[must_use]
    pub fn download_dir(&self) -> PathBuf {
        self.cache_dir.join("downloads")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("debug.log")
    }

    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.data_dir.join("run.lock")
    }

    /// # Errors
    /// Returns the first directory that cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.config_dir, &self.cache_dir, &self.data_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
