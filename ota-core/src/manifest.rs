//! The four-line update manifest
//!
//! ```text
//! https://myserver/ota/lastBuild.bin   <- binary URL
//! 3                                    <- version token
//! a2fbf5835de079474e820ceda2ca9986     <- optional MD5
//! 1.3                                  <- optional display version
//! ```

use thiserror::Error;

use crate::checksum::{Checksum, ChecksumError};
use crate::version::{VersionParseError, VersionScheme, VersionSpec};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("manifest does not name a firmware binary")]
    MissingBinaryUrl,

    #[error("manifest body is not valid UTF-8")]
    Encoding,

    #[error("manifest body exceeds {0} bytes")]
    TooLarge(u64),

    #[error("invalid version token: {0}")]
    Version(#[from] VersionParseError),

    #[error("invalid checksum: {0}")]
    Checksum(#[from] ChecksumError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub binary_url: String,
    pub version: VersionSpec,
    pub checksum: Option<Checksum>,
    pub display_version: String,
}

impl Manifest {
    /// Parse a manifest body, reading the version under `scheme`.
    ///
    /// Lines past the fourth are ignored and missing lines read as empty.
    pub fn parse(body: &str, scheme: VersionScheme) -> Result<Self, ManifestError> {
        let mut lines = body.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));
        let mut next_line = || lines.next().unwrap_or_default();

        let binary_url = next_line().trim();
        let version_token = next_line();
        let checksum = next_line().trim();
        let display_version = next_line().trim();

        if binary_url.is_empty() {
            return Err(ManifestError::MissingBinaryUrl);
        }

        let version = VersionSpec::parse_as(scheme, version_token)?;

        let checksum = if checksum.is_empty() {
            None
        } else {
            Some(Checksum::parse(checksum)?)
        };

        Ok(Self {
            binary_url: binary_url.to_string(),
            version,
            checksum,
            display_version: display_version.to_string(),
        })
    }

    /// Render in the wire format, one field per line.
    pub fn to_wire(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n",
            self.binary_url,
            self.version,
            self.checksum.as_ref().map(Checksum::as_str).unwrap_or_default(),
            self.display_version
        )
    }
}
