/// Whether the device handle is dropped after every operation.
///
/// On macOS, YubiKey 5 keeps its PIN cache across sessions, so releasing
/// the PC/SC connection lets other programs use the key without costing
/// the user a PIN prompt. Older keys, and other platforms, lose the PIN
/// cache on reopen, so the handle is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleasePolicy {
    /// Set explicitly, regardless of the device
    Fixed(bool),
    /// Release when the platform allows it and the firmware keeps the PIN
    /// cache across sessions
    ByFirmware { platform_releases: bool },
}

/// First firmware major version that keeps the PIN cache across sessions
pub const PIN_CACHE_FIRMWARE_MAJOR: u8 = 5;

impl ReleasePolicy {
    pub const KEEP: ReleasePolicy = ReleasePolicy::Fixed(false);

    pub const RELEASE_AFTER_USE: ReleasePolicy = ReleasePolicy::Fixed(true);

    pub fn new(release_after_use: bool) -> Self {
        Self::Fixed(release_after_use)
    }

    /// Decided by the target platform and the firmware of the first device
    pub fn for_platform() -> Self {
        Self::ByFirmware {
            platform_releases: cfg!(target_os = "macos"),
        }
    }

    /// The release decision for a device with the given firmware
    pub fn resolve(self, firmware_major: u8) -> bool {
        match self {
            ReleasePolicy::Fixed(release) => release,
            ReleasePolicy::ByFirmware { platform_releases } => {
                platform_releases && firmware_major >= PIN_CACHE_FIRMWARE_MAJOR
            }
        }
    }
}

impl Default for ReleasePolicy {
    fn default() -> Self {
        Self::for_platform()
    }
}
