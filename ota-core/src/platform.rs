//! Collaborators the update logic depends on.
//!
//! The firmware implements these on top of ESP-IDF (HTTP client, OTA
//! partitions, Wi-Fi, `esp_restart`); host tests and `ota-tool` provide their
//! own. None of the traits are expected to be called concurrently.

use std::io::Read;

use thiserror::Error;

use crate::checksum::Checksum;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to initialize HTTP client for {0}")]
    Init(String),

    #[error("connection failed: {0}")]
    Connection(String),
}

/// Plain GET over HTTP or HTTPS.
///
/// Implementations must not follow redirects on their own: the caller
/// enforces the redirect budget and the SSL policy on every hop.
pub trait HttpTransport {
    type Response: HttpResponse;

    fn get(&mut self, url: &str) -> Result<Self::Response, TransportError>;
}

/// An in-flight response. The body is read through [`Read`]; dropping the
/// response ends the request.
pub trait HttpResponse: Read {
    fn status(&self) -> u16;

    fn header(&self, name: &str) -> Option<String>;

    /// Declared body length, `None` when the server did not send one.
    fn content_length(&self) -> Option<u64>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("expected checksum rejected: {0}")]
    Checksum(String),

    #[error("not enough space: need {needed} bytes, {available} available")]
    InsufficientSpace { needed: u64, available: u64 },

    #[error("flash write failed: {0}")]
    Write(String),

    #[error("update validation failed: {0}")]
    Finalize(String),

    #[error("storage driver error: {0}")]
    Driver(String),
}

/// The inactive firmware slot.
pub trait UpdateStorage {
    type Writer<'a>: UpdateWriter
    where
        Self: 'a;

    /// Register the digest the finished image must match. Called before
    /// [`UpdateStorage::begin`] when the manifest carries a checksum.
    fn set_expected_checksum(&mut self, checksum: &Checksum) -> Result<(), StorageError>;

    /// Open a write session for an image of exactly `size` bytes.
    fn begin(&mut self, size: u64) -> Result<Self::Writer<'_>, StorageError>;
}

/// A scoped write session. Dropping it without [`UpdateWriter::finalize`]
/// discards whatever was written.
pub trait UpdateWriter {
    fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError>;

    /// Close the session, check the registered checksum and mark the slot
    /// bootable.
    fn finalize(self) -> Result<(), StorageError>;
}

/// Link state, monotonic clock and reset line of the device.
pub trait Device {
    fn is_connected(&self) -> bool;

    /// Milliseconds from an arbitrary fixed origin, never decreasing.
    fn now_ms(&self) -> u64;

    fn restart(&mut self) -> !;
}
