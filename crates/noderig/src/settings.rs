use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use noderig_backend::DistUrls;
use noderig_platform::AppPaths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,

    #[serde(default = "default_nodejs_dist_url")]
    pub nodejs_dist_url: String,

    #[serde(default = "default_iojs_dist_url")]
    pub iojs_dist_url: String,

    #[serde(default = "default_true")]
    pub verify_checksums: bool,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// `null` leaves `--unsafe-perm` off npm command lines.
    #[serde(default = "default_unsafe_perm")]
    pub unsafe_perm: Option<bool>,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_install_root() -> PathBuf {
    PathBuf::from("/opt")
}

fn default_nodejs_dist_url() -> String {
    DistUrls::default().nodejs
}

fn default_iojs_dist_url() -> String {
    DistUrls::default().iojs
}

fn default_true() -> bool {
    true
}

fn default_command_timeout() -> u64 {
    900
}

fn default_http_timeout() -> u64 {
    30
}

#[allow(clippy::unnecessary_wraps)]
fn default_unsafe_perm() -> Option<bool> {
    Some(true)
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            install_root: default_install_root(),
            nodejs_dist_url: default_nodejs_dist_url(),
            iojs_dist_url: default_iojs_dist_url(),
            verify_checksums: true,
            command_timeout_secs: default_command_timeout(),
            http_timeout_secs: default_http_timeout(),
            unsafe_perm: default_unsafe_perm(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl Settings {
    pub fn load(paths: &AppPaths) -> Self {
        Self::load_from(&paths.settings_file())
    }

    /// Read settings, falling back to defaults for a missing or broken file.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                warn!("Ignoring invalid settings in {}: {error}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
    }

    pub fn dist_urls(&self) -> DistUrls {
        DistUrls {
            nodejs: self.nodejs_dist_url.clone(),
            iojs: self.iojs_dist_url.clone(),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
