use noderig_backend::PlatformKey;

/// Raw machine names that release archives label differently.
pub const MACHINE_LABELS: &[(&str, &str)] = &[("i386", "x86"), ("i686", "x86"), ("x86_64", "x64")];

/// `kernel-machine` pairs upstream publishes prebuilt archives for.
pub const SUPPORTED_MACHINES: &[&str] = &["linux-i686", "linux-x86_64", "darwin-x86_64"];

/// Architecture label used in release archive names. Machines without an
/// entry in [`MACHINE_LABELS`] pass through unchanged.
#[must_use]
pub fn machine_label(key: &PlatformKey) -> &str {
    MACHINE_LABELS
        .iter()
        .find(|(raw, _)| *raw == key.machine)
        .map_or(key.machine.as_str(), |(_, label)| label)
}

#[must_use]
pub fn is_supported_machine(key: &PlatformKey) -> bool {
    let label = key.label();
    SUPPORTED_MACHINES.iter().any(|supported| *supported == label)
}

#[cfg(test)]
mod tests {
    use noderig_backend::PlatformKey;

    use super::{is_supported_machine, machine_label};

    #[test]
    fn known_machines_are_relabelled() {
        assert_eq!(machine_label(&PlatformKey::new("linux", "i386")), "x86");
        assert_eq!(machine_label(&PlatformKey::new("linux", "i686")), "x86");
        assert_eq!(machine_label(&PlatformKey::new("darwin", "x86_64")), "x64");
    }

    #[test]
    fn unknown_machines_pass_through() {
        assert_eq!(machine_label(&PlatformKey::new("linux", "armv7l")), "armv7l");
        assert_eq!(machine_label(&PlatformKey::new("linux", "aarch64")), "aarch64");
    }

    #[test]
    fn supported_set_is_exact() {
        assert!(is_supported_machine(&PlatformKey::new("Linux", "x86_64")));
        assert!(is_supported_machine(&PlatformKey::new("linux", "i686")));
        assert!(is_supported_machine(&PlatformKey::new("darwin", "x86_64")));
        assert!(!is_supported_machine(&PlatformKey::new("linux", "i386")));
        assert!(!is_supported_machine(&PlatformKey::new("darwin", "arm64")));
        assert!(!is_supported_machine(&PlatformKey::new("linux", "armv7l")));
    }
}
