//! OTA Core - Hardware-independent update logic for the ESP32 OTA updater
//!
//! This crate contains the update decision and fetch/flash state machine. Everything
//! that touches the network, flash or the chip itself goes through the traits in
//! [`platform`], so the whole flow can be tested on the host platform without
//! ESP32 hardware.

pub mod checksum;
pub mod config;
pub mod decision;
pub mod fetch;
pub mod install;
pub mod manifest;
pub mod outcome;
pub mod platform;
pub mod policy;
pub mod session;
pub mod version;

pub use checksum::{Checksum, ChecksumError, Md5Verifier};
pub use config::{ConfigError, UpdaterConfig};
pub use decision::{decide, Decision};
pub use fetch::{FetchError, ManifestFetcher, DEFAULT_REDIRECT_BUDGET};
pub use install::{FirmwareInstaller, InstallError, InstallState};
pub use manifest::{Manifest, ManifestError};
pub use outcome::UpdateOutcome;
pub use platform::{
    Device, HttpResponse, HttpTransport, StorageError, TransportError, UpdateStorage,
    UpdateWriter,
};
pub use policy::UrlPolicy;
pub use session::{UpdateSession, DEFAULT_CHECK_INTERVAL};
pub use version::{compare, parse_counter, parse_semver, SemVer, VersionParseError, VersionScheme, VersionSpec};
