use log::{debug, warn};
use std::path::Path;
use tokio::process::Command;

use noderig_backend::{HostInfo, PlatformKey};

use crate::commands::HideWindow;

/// Map an `/etc/os-release` document to (platform, platform family, version).
///
/// Platform names follow the configuration-management conventions providers
/// are keyed on (`redhat` rather than `rhel`, `amazon` rather than `amzn`).
#[must_use]
pub fn parse_os_release(content: &str) -> (String, String, String) {
    let mut id = String::new();
    let mut id_like = String::new();
    let mut version = String::new();

    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
        match key.trim() {
            "ID" => id = value.to_lowercase(),
            "ID_LIKE" => id_like = value.to_lowercase(),
            "VERSION_ID" => version = value,
            _ => {}
        }
    }

    let platform = match id.as_str() {
        "rhel" => "redhat".to_string(),
        "amzn" => "amazon".to_string(),
        "ol" => "oracle".to_string(),
        _ => id.clone(),
    };

    let family = match platform.as_str() {
        "debian" | "ubuntu" | "linuxmint" | "raspbian" => "debian",
        "redhat" | "centos" | "scientific" | "oracle" | "rocky" | "almalinux" => "rhel",
        "amazon" => "amazon",
        "fedora" => "fedora",
        "arch" => "arch",
        "gentoo" => "gentoo",
        "opensuse" | "opensuse-leap" | "sles" => "suse",
        _ if id_like.split_whitespace().any(|like| like == "debian") => "debian",
        _ if id_like
            .split_whitespace()
            .any(|like| like == "rhel" || like == "centos") =>
        {
            "rhel"
        }
        _ => platform.as_str(),
    }
    .to_string();

    (platform, family, version)
}

async fn uname(flag: &str) -> Option<String> {
    let output = Command::new("uname")
        .arg(flag)
        .hide_window()
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn fallback_kernel() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn fallback_machine() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "i686",
        other => other,
    }
}

async fn mac_version() -> String {
    let output = Command::new("sw_vers")
        .arg("-productVersion")
        .hide_window()
        .output()
        .await;
    match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => String::new(),
    }
}

/// Detect kernel, machine and distribution of the local host.
///
/// Detection never fails; unknown facts come back as empty strings.
pub async fn detect_host() -> HostInfo {
    let kernel = uname("-s")
        .await
        .unwrap_or_else(|| fallback_kernel().to_string());
    let machine = uname("-m")
        .await
        .unwrap_or_else(|| fallback_machine().to_string());
    let key = PlatformKey::new(kernel, machine);

    let (platform, family, version) = if key.kernel == "darwin" {
        ("mac_os_x".to_string(), "mac_os_x".to_string(), mac_version().await)
    } else {
        match tokio::fs::read_to_string(Path::new("/etc/os-release")).await {
            Ok(content) => parse_os_release(&content),
            Err(error) => {
                warn!("Could not read /etc/os-release: {error}");
                (key.kernel.clone(), key.kernel.clone(), String::new())
            }
        }
    };

    let host = HostInfo::new(key, platform, family, version);
    debug!("Detected host: {host}");
    host
}
