//! Streams a firmware image into the update slot and reboots into it
//!
//! One attempt walks `Idle → Connecting → Downloading → Writing → Finalizing
//! → Rebooting`. The first failure ends the attempt; nothing is retried or
//! resumed here.

use core::convert::Infallible;
use std::io::{ErrorKind, Read};

use log::{debug, error, info};
use thiserror::Error;

use crate::checksum::Checksum;
use crate::platform::{
    Device, HttpResponse, HttpTransport, StorageError, TransportError, UpdateStorage,
    UpdateWriter,
};
use crate::policy::UrlPolicy;

const CHUNK_SIZE: usize = 4096;
const PROGRESS_LOG_STEP: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    #[error("network not connected")]
    NotConnected,

    #[error("firmware URL is empty")]
    MissingUrl,

    #[error("refusing non-SSL firmware URL '{0}' on a secure update checker")]
    InsecureUrl(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected HTTP status {0} for firmware download")]
    Status(u16),

    #[error("fetched binary has 0 size")]
    PayloadEmpty,

    #[error("failed to set the expected MD5: {0}")]
    ChecksumRejected(StorageError),

    #[error("not enough space to begin OTA: {0}")]
    StorageInsufficient(StorageError),

    #[error("written {written} out of {expected} bytes")]
    ShortWrite { written: u64, expected: u64 },

    #[error("finalizing update failed: {0}")]
    FinalizeFailed(StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    Connecting,
    Downloading,
    Writing { progress: u8 },
    Finalizing,
    Rebooting,
    Failed,
}

pub struct FirmwareInstaller<'a, H, S> {
    http: &'a mut H,
    storage: &'a mut S,
    policy: UrlPolicy,
    state: InstallState,
}

impl<'a, H: HttpTransport, S: UpdateStorage> FirmwareInstaller<'a, H, S> {
    pub fn new(http: &'a mut H, storage: &'a mut S, policy: UrlPolicy) -> Self {
        Self {
            http,
            storage,
            policy,
            state: InstallState::Idle,
        }
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    /// Everything up to the restart: download, write and finalize the image.
    /// Returns the number of bytes committed.
    pub fn stage<D: Device>(
        &mut self,
        device: &D,
        url: &str,
        checksum: Option<&Checksum>,
    ) -> Result<u64, InstallError> {
        let result = self.write_image(device, url, checksum);
        if result.is_err() {
            self.state = InstallState::Failed;
        }
        result
    }

    /// Stage the image and restart into it. Only returns on failure.
    pub fn install<D: Device>(
        &mut self,
        device: &mut D,
        url: &str,
        checksum: Option<&Checksum>,
    ) -> Result<Infallible, InstallError> {
        let written = self.stage(device, url, checksum)?;

        info!("Update completed ({} bytes). Rebooting", written);
        self.state = InstallState::Rebooting;
        log::logger().flush();
        device.restart()
    }

    fn write_image<D: Device>(
        &mut self,
        device: &D,
        url: &str,
        checksum: Option<&Checksum>,
    ) -> Result<u64, InstallError> {
        debug!("Fetching OTA from: {}", url);
        self.state = InstallState::Connecting;

        if !device.is_connected() {
            error!("Wifi not connected");
            return Err(InstallError::NotConnected);
        }

        if url.is_empty() {
            error!("No firmware URL to fetch");
            return Err(InstallError::MissingUrl);
        }

        if !self.policy.permits(url) {
            error!("Trying to access a non-ssl URL on a secure update checker: {}", url);
            return Err(InstallError::InsecureUrl(url.to_string()));
        }

        let mut response = self.http.get(url).map_err(|e| {
            error!("Error initializing client: {}", e);
            InstallError::from(e)
        })?;

        let status = response.status();
        if status != 200 {
            error!("[HTTP] [ERROR] [{}] downloading {}", status, url);
            return Err(InstallError::Status(status));
        }

        self.state = InstallState::Downloading;

        let size = match response.content_length() {
            Some(n) if n > 0 => n,
            _ => {
                error!("Fetched binary has 0 size");
                return Err(InstallError::PayloadEmpty);
            }
        };

        if let Some(expected) = checksum {
            self.storage.set_expected_checksum(expected).map_err(|e| {
                error!("Failed to set the expected MD5: {}", e);
                InstallError::ChecksumRejected(e)
            })?;
        }

        let mut writer = self.storage.begin(size).map_err(|e| {
            error!("Not enough space to begin OTA: {}", e);
            InstallError::StorageInsufficient(e)
        })?;

        self.state = InstallState::Writing { progress: 0 };
        let written = copy_image(&mut response, &mut writer, size, &mut self.state);
        if written != size {
            error!("Error. Written {} out of {}", written, size);
            return Err(InstallError::ShortWrite {
                written,
                expected: size,
            });
        }

        self.state = InstallState::Finalizing;
        writer.finalize().map_err(|e| {
            error!("Error Occurred: {}", e);
            InstallError::FinalizeFailed(e)
        })?;

        Ok(written)
    }
}

/// Copy at most `size` bytes from `source` into `writer`. Stops at end of
/// stream or on the first read or write error and returns the byte count.
fn copy_image<R: Read, W: UpdateWriter>(
    source: &mut R,
    writer: &mut W,
    size: u64,
    state: &mut InstallState,
) -> u64 {
    let mut buf = [0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    let mut next_log = PROGRESS_LOG_STEP;

    while written < size {
        let want = (size - written).min(CHUNK_SIZE as u64) as usize;
        let read = match source.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("Firmware stream failed after {} bytes: {}", written, e);
                break;
            }
        };

        if let Err(e) = writer.write(&buf[..read]) {
            error!("Flash write failed after {} bytes: {}", written, e);
            break;
        }
        written += read as u64;

        let progress = (written * 100 / size) as u8;
        *state = InstallState::Writing { progress };
        if progress >= next_log {
            info!("OTA progress: {}% ({}/{})", progress, written, size);
            next_log = progress - progress % PROGRESS_LOG_STEP + PROGRESS_LOG_STEP;
        }
    }

    written
}
