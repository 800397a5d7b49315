//! Terminal result of one check / update cycle

use core::fmt;

use crate::decision::Decision;
use crate::fetch::FetchError;
use crate::install::InstallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// `check` found newer firmware; nothing was installed yet.
    UpdateAvailable,
    /// The image was committed and the device is restarting. Callers never
    /// see this returned on real hardware.
    UpdateApplied,
    UpToDate,
    ThrottledSkip,
    NetworkUnavailable,
    TransportFailure,
    ManifestMalformed,
    ChecksumRejected,
    StorageInsufficient,
    RedirectLoopExceeded,
    InsecureUrlRejected,
    PayloadEmpty,
    ShortWrite,
    FinalizeFailed,
}

impl UpdateOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            UpdateOutcome::UpdateAvailable
                | UpdateOutcome::UpdateApplied
                | UpdateOutcome::UpToDate
                | UpdateOutcome::ThrottledSkip
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOutcome::UpdateAvailable => "update available",
            UpdateOutcome::UpdateApplied => "update applied",
            UpdateOutcome::UpToDate => "up to date",
            UpdateOutcome::ThrottledSkip => "throttled",
            UpdateOutcome::NetworkUnavailable => "network unavailable",
            UpdateOutcome::TransportFailure => "transport failure",
            UpdateOutcome::ManifestMalformed => "malformed manifest",
            UpdateOutcome::ChecksumRejected => "checksum rejected",
            UpdateOutcome::StorageInsufficient => "insufficient storage",
            UpdateOutcome::RedirectLoopExceeded => "too many redirects",
            UpdateOutcome::InsecureUrlRejected => "insecure URL rejected",
            UpdateOutcome::PayloadEmpty => "empty payload",
            UpdateOutcome::ShortWrite => "short write",
            UpdateOutcome::FinalizeFailed => "finalize failed",
        }
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Decision> for UpdateOutcome {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::UpdateAvailable => UpdateOutcome::UpdateAvailable,
            Decision::UpToDate => UpdateOutcome::UpToDate,
        }
    }
}

impl From<&FetchError> for UpdateOutcome {
    fn from(e: &FetchError) -> Self {
        match e {
            FetchError::RedirectLoopExceeded => UpdateOutcome::RedirectLoopExceeded,
            FetchError::InsecureUrl(_) => UpdateOutcome::InsecureUrlRejected,
            FetchError::Transport(_)
            | FetchError::Status(_)
            | FetchError::MissingLocation(_)
            | FetchError::Body(_) => UpdateOutcome::TransportFailure,
            FetchError::ChecksumRejected(_) => UpdateOutcome::ChecksumRejected,
            FetchError::Malformed(_) => UpdateOutcome::ManifestMalformed,
        }
    }
}

impl From<&InstallError> for UpdateOutcome {
    fn from(e: &InstallError) -> Self {
        match e {
            InstallError::NotConnected => UpdateOutcome::NetworkUnavailable,
            InstallError::MissingUrl => UpdateOutcome::ManifestMalformed,
            InstallError::InsecureUrl(_) => UpdateOutcome::InsecureUrlRejected,
            InstallError::Transport(_) | InstallError::Status(_) => UpdateOutcome::TransportFailure,
            InstallError::PayloadEmpty => UpdateOutcome::PayloadEmpty,
            InstallError::ChecksumRejected(_) => UpdateOutcome::ChecksumRejected,
            InstallError::StorageInsufficient(_) => UpdateOutcome::StorageInsufficient,
            InstallError::ShortWrite { .. } => UpdateOutcome::ShortWrite,
            InstallError::FinalizeFailed(_) => UpdateOutcome::FinalizeFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumError;
    use crate::manifest::ManifestError;
    use crate::platform::{StorageError, TransportError};

    #[test]
    fn test_fetch_errors_map_to_outcomes() {
        assert_eq!(
            UpdateOutcome::from(&FetchError::RedirectLoopExceeded),
            UpdateOutcome::RedirectLoopExceeded
        );
        assert_eq!(
            UpdateOutcome::from(&FetchError::Status(500)),
            UpdateOutcome::TransportFailure
        );
        assert_eq!(
            UpdateOutcome::from(&FetchError::Transport(TransportError::Connection("reset".into()))),
            UpdateOutcome::TransportFailure
        );
        assert_eq!(
            UpdateOutcome::from(&FetchError::ChecksumRejected(ChecksumError::Length(8))),
            UpdateOutcome::ChecksumRejected
        );
        assert_eq!(
            UpdateOutcome::from(&FetchError::Malformed(ManifestError::MissingBinaryUrl)),
            UpdateOutcome::ManifestMalformed
        );
        assert_eq!(
            UpdateOutcome::from(&FetchError::InsecureUrl("http://x".into())),
            UpdateOutcome::InsecureUrlRejected
        );
    }

    #[test]
    fn test_install_errors_map_to_outcomes() {
        assert_eq!(
            UpdateOutcome::from(&InstallError::StorageInsufficient(StorageError::Driver("full".into()))),
            UpdateOutcome::StorageInsufficient
        );
        assert_eq!(
            UpdateOutcome::from(&InstallError::ShortWrite { written: 1, expected: 2 }),
            UpdateOutcome::ShortWrite
        );
        assert_eq!(UpdateOutcome::from(&InstallError::PayloadEmpty), UpdateOutcome::PayloadEmpty);
    }

    #[test]
    fn test_failure_classification() {
        assert!(!UpdateOutcome::ThrottledSkip.is_failure());
        assert!(!UpdateOutcome::UpToDate.is_failure());
        assert!(UpdateOutcome::NetworkUnavailable.is_failure());
        assert!(UpdateOutcome::FinalizeFailed.is_failure());
    }
}
