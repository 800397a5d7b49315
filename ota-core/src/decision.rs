//! Decide whether a fetched manifest names newer firmware

use core::cmp::Ordering;

use crate::manifest::Manifest;
use crate::version::{compare, VersionSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    UpdateAvailable,
    UpToDate,
}

pub fn decide(current: &VersionSpec, manifest: &Manifest) -> Decision {
    match compare(current, &manifest.version) {
        Some(Ordering::Greater) => Decision::UpdateAvailable,
        Some(_) => Decision::UpToDate,
        None => {
            // Manifests are parsed with the running version's scheme
            debug_assert!(false, "version scheme mismatch: {} vs {}", current, manifest.version);
            log::error!(
                "Version scheme mismatch: running {} ({}), published {} ({})",
                current,
                current.scheme(),
                manifest.version,
                manifest.version.scheme()
            );
            Decision::UpToDate
        }
    }
}
