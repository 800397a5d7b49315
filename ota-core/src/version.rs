//! Firmware version representations and their ordering
//!
//! A device is built with exactly one scheme: a plain integer counter or a
//! `major.minor.patch<letter>` version. The scheme never changes for the
//! lifetime of an update session.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionScheme {
    Counter,
    SemVer,
}

impl fmt::Display for VersionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionScheme::Counter => f.write_str("counter"),
            VersionScheme::SemVer => f.write_str("semver"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("version token is empty")]
    Empty,

    #[error("expected 3 dot-separated segments, found {0}")]
    SegmentCount(usize),

    #[error("invalid numeric segment '{0}'")]
    InvalidNumber(String),

    #[error("version must end with a qualifier letter")]
    MissingQualifier,

    #[error("'{input}' is not in canonical form (expected '{rendered}')")]
    NonCanonical { input: String, rendered: String },

    #[error("invalid counter version '{0}'")]
    Counter(String),
}

/// `major.minor.patch` plus a trailing qualifier letter, e.g. `1.4.2b`.
///
/// Ordering is lexicographic by component, most significant first, so a
/// bump of any higher component wins regardless of the qualifier letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemVer {
    major: u8,
    minor: u8,
    patch: u8,
    // Lower-cased ASCII letter
    qualifier: u8,
}

impl SemVer {
    /// Returns `None` when `qualifier` is not an ASCII letter.
    pub fn new(major: u8, minor: u8, patch: u8, qualifier: char) -> Option<Self> {
        if !qualifier.is_ascii_alphabetic() {
            return None;
        }
        Some(Self {
            major,
            minor,
            patch,
            qualifier: qualifier.to_ascii_lowercase() as u8,
        })
    }

    pub fn major(&self) -> u8 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }

    pub fn patch(&self) -> u8 {
        self.patch
    }

    pub fn qualifier(&self) -> char {
        self.qualifier as char
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}{}",
            self.major, self.minor, self.patch, self.qualifier as char
        )
    }
}

impl FromStr for SemVer {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_semver(s)
    }
}

/// Parse a `D.D.D<letter>` token.
///
/// The input is trimmed and lower-cased, parsed, then rendered back and
/// compared byte-for-byte with the normalized input. Anything that does not
/// survive that round trip (leading zeros, signs, inner whitespace) is
/// rejected rather than partially accepted.
pub fn parse_semver(text: &str) -> Result<SemVer, VersionParseError> {
    let normalized = text.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return Err(VersionParseError::Empty);
    }

    let mut segments = normalized.split('.');
    let (Some(major), Some(minor), Some(last), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(VersionParseError::SegmentCount(normalized.split('.').count()));
    };

    let qualifier = last
        .chars()
        .last()
        .filter(char::is_ascii_alphabetic)
        .ok_or(VersionParseError::MissingQualifier)?;
    let patch = last
        .strip_suffix(qualifier)
        .ok_or(VersionParseError::MissingQualifier)?;

    let parsed = SemVer {
        major: component(major)?,
        minor: component(minor)?,
        patch: component(patch)?,
        qualifier: qualifier as u8,
    };

    let rendered = parsed.to_string();
    if rendered != normalized {
        return Err(VersionParseError::NonCanonical {
            input: normalized,
            rendered,
        });
    }

    log::trace!("Parsed semantic version {} from '{}'", parsed, text);
    Ok(parsed)
}

fn component(segment: &str) -> Result<u8, VersionParseError> {
    segment
        .parse::<u8>()
        .map_err(|_| VersionParseError::InvalidNumber(segment.to_string()))
}

/// Parse a decimal counter token. Surrounding whitespace is ignored; the
/// rest must be ASCII digits only, so signs are rejected.
pub fn parse_counter(text: &str) -> Result<u32, VersionParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(VersionParseError::Empty);
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionParseError::Counter(trimmed.to_string()));
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| VersionParseError::Counter(trimmed.to_string()))
}

/// A firmware version in one of the two supported encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionSpec {
    Counter(u32),
    SemVer(SemVer),
}

impl VersionSpec {
    pub fn scheme(&self) -> VersionScheme {
        match self {
            VersionSpec::Counter(_) => VersionScheme::Counter,
            VersionSpec::SemVer(_) => VersionScheme::SemVer,
        }
    }

    /// Parse `token` under a fixed scheme. Schemes are never auto-detected.
    pub fn parse_as(scheme: VersionScheme, token: &str) -> Result<Self, VersionParseError> {
        match scheme {
            VersionScheme::Counter => parse_counter(token).map(VersionSpec::Counter),
            VersionScheme::SemVer => parse_semver(token).map(VersionSpec::SemVer),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Counter(n) => write!(f, "{}", n),
            VersionSpec::SemVer(v) => write!(f, "{}", v),
        }
    }
}

impl From<SemVer> for VersionSpec {
    fn from(v: SemVer) -> Self {
        VersionSpec::SemVer(v)
    }
}

// Versions of different schemes are incomparable.
impl PartialOrd for VersionSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (VersionSpec::Counter(a), VersionSpec::Counter(b)) => Some(a.cmp(b)),
            (VersionSpec::SemVer(a), VersionSpec::SemVer(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// How `candidate` orders relative to `current`.
///
/// `Some(Ordering::Greater)` means the candidate is newer than what is
/// running. `None` only when the two versions use different schemes.
pub fn compare(current: &VersionSpec, candidate: &VersionSpec) -> Option<Ordering> {
    candidate.partial_cmp(current)
}
