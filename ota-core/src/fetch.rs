//! Manifest retrieval with bounded redirect following

use std::io::Read;

use log::{debug, error};
use thiserror::Error;

use crate::checksum::ChecksumError;
use crate::manifest::{Manifest, ManifestError};
use crate::platform::{HttpResponse, HttpTransport, TransportError};
use crate::policy::UrlPolicy;
use crate::version::VersionScheme;

/// Number of requests a single manifest fetch may make, redirects included
pub const DEFAULT_REDIRECT_BUDGET: u8 = 5;

/// Largest manifest body accepted. Leaves room for long presigned binary
/// URLs; a bigger body is rejected rather than cut.
pub const MAX_MANIFEST_BYTES: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("too many retries/redirections")]
    RedirectLoopExceeded,

    #[error("refusing non-SSL URL '{0}' on a secure update checker")]
    InsecureUrl(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("HTTP {0} redirect without a Location header")]
    MissingLocation(u16),

    #[error("failed to read manifest body: {0}")]
    Body(String),

    #[error("{0}")]
    ChecksumRejected(ChecksumError),

    #[error("malformed manifest: {0}")]
    Malformed(ManifestError),
}

impl From<ManifestError> for FetchError {
    fn from(e: ManifestError) -> Self {
        match e {
            ManifestError::Checksum(inner) => FetchError::ChecksumRejected(inner),
            other => FetchError::Malformed(other),
        }
    }
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Byte offset just past `scheme://` when `url` starts with one.
fn scheme_end(url: &str) -> Option<usize> {
    let colon = url.find("://")?;
    let scheme = &url[..colon];
    let valid = scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(colon + 3)
}

/// Resolve a `Location` value against the URL that produced it.
fn resolve_location(base: &str, location: &str) -> String {
    if scheme_end(location).is_some() {
        return location.to_string();
    }

    // Query and fragment of the base never take part in resolution
    let base = &base[..base.find(&['?', '#'][..]).unwrap_or(base.len())];
    let origin_start = scheme_end(base).unwrap_or(0);
    if let Some(rest) = location.strip_prefix("//") {
        return format!("{}{}", &base[..origin_start], rest);
    }

    let origin_end = base[origin_start..]
        .find('/')
        .map(|i| origin_start + i)
        .unwrap_or(base.len());
    if location.starts_with('/') {
        format!("{}{}", &base[..origin_end], location)
    } else {
        let dir_end = base[origin_end..]
            .rfind('/')
            .map(|i| origin_end + i + 1)
            .unwrap_or(base.len());
        let dir = &base[..dir_end];
        if dir.ends_with('/') {
            format!("{}{}", dir, location)
        } else {
            format!("{}/{}", dir, location)
        }
    }
}

pub struct ManifestFetcher {
    policy: UrlPolicy,
    scheme: VersionScheme,
}

impl ManifestFetcher {
    pub fn new(policy: UrlPolicy, scheme: VersionScheme) -> Self {
        Self { policy, scheme }
    }

    pub fn policy(&self) -> UrlPolicy {
        self.policy
    }

    /// Fetch and parse the manifest at `url`.
    ///
    /// Each request spends one unit of `redirect_budget`; a budget of zero
    /// fails before anything is sent.
    pub fn fetch<H: HttpTransport>(
        &self,
        http: &mut H,
        url: &str,
        redirect_budget: u8,
    ) -> Result<Manifest, FetchError> {
        let mut url = url.to_string();
        let mut budget = redirect_budget;

        loop {
            if budget == 0 {
                error!("Too many retries/redirections");
                return Err(FetchError::RedirectLoopExceeded);
            }
            budget -= 1;

            debug!("Fetching OTA config from: {}", url);

            if !self.policy.permits(&url) {
                error!("Trying to access a non-ssl URL on a secure update checker: {}", url);
                return Err(FetchError::InsecureUrl(url));
            }

            let mut response = http.get(&url).map_err(|e| {
                error!("Error initializing client: {}", e);
                FetchError::from(e)
            })?;

            match response.status() {
                200 => return self.read_manifest(&mut response),
                status if is_redirect(status) => match response.header("Location") {
                    Some(location) => {
                        let next = resolve_location(&url, &location);
                        debug!("[HTTP] {} redirect to {} ({} requests left)", status, next, budget);
                        url = next;
                    }
                    None => {
                        error!("[HTTP] [ERROR] [{}] redirect without Location header", status);
                        return Err(FetchError::MissingLocation(status));
                    }
                },
                status => {
                    error!("[HTTP] [ERROR] [{}] fetching {}", status, url);
                    return Err(FetchError::Status(status));
                }
            }
        }
    }

    fn read_manifest<R: Read>(&self, body: &mut R) -> Result<Manifest, FetchError> {
        let mut raw = Vec::new();
        body.take(MAX_MANIFEST_BYTES + 1)
            .read_to_end(&mut raw)
            .map_err(|e| {
                error!("Error reading manifest body: {}", e);
                FetchError::Body(e.to_string())
            })?;
        if raw.len() as u64 > MAX_MANIFEST_BYTES {
            error!("Manifest body exceeds {} bytes", MAX_MANIFEST_BYTES);
            return Err(FetchError::Malformed(ManifestError::TooLarge(MAX_MANIFEST_BYTES)));
        }

        let text = String::from_utf8(raw).map_err(|_| {
            error!("Manifest body is not valid UTF-8");
            FetchError::Malformed(ManifestError::Encoding)
        })?;

        let manifest = Manifest::parse(&text, self.scheme).map_err(|e| {
            match &e {
                ManifestError::MissingBinaryUrl => error!("Error parsing remote path of new binary"),
                ManifestError::Version(v) => error!("Error parsing version number: {}", v),
                ManifestError::Checksum(c) => error!("Rejecting manifest checksum, aborting update: {}", c),
                ManifestError::Encoding => error!("Manifest body is not valid UTF-8"),
                ManifestError::TooLarge(max) => error!("Manifest body exceeds {} bytes", max),
            }
            FetchError::from(e)
        })?;

        debug!("Fetched update information:");
        debug!("File url:           {}", manifest.binary_url);
        debug!(
            "File MD5:           {}",
            manifest.checksum.as_ref().map(|c| c.as_str()).unwrap_or("<none>")
        );
        debug!(
            "Published version:  [{}] {}",
            manifest.version, manifest.display_version
        );

        Ok(manifest)
    }
}
