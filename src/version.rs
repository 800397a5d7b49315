// Centralized version information

use ota_core::{VersionParseError, VersionScheme, VersionSpec};

// Version compared against the update manifest, set at build time through
// OTA_FIRMWARE_VERSION (see build.rs)
pub const FIRMWARE_VERSION: &str = env!("OTA_FIRMWARE_VERSION");

// Cargo package version from Cargo.toml
pub const CARGO_VERSION: &str = env!("CARGO_PKG_VERSION");

// Full version string for the boot banner
pub fn full_version() -> String {
    format!("{} ({})", FIRMWARE_VERSION, CARGO_VERSION)
}

/// Scheme is implied by the token: dotted versions are SemVer, bare numbers
/// are counters.
pub fn scheme_of(token: &str) -> VersionScheme {
    if token.contains('.') {
        VersionScheme::SemVer
    } else {
        VersionScheme::Counter
    }
}

pub fn current() -> Result<VersionSpec, VersionParseError> {
    VersionSpec::parse_as(scheme_of(FIRMWARE_VERSION), FIRMWARE_VERSION)
}
