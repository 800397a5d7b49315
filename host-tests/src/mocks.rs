//! Scripted stand-ins for the HTTP client, OTA partition and device

use std::collections::HashMap;
use std::io::{self, Cursor, Read};

use ota_core::{
    Checksum, Device, HttpResponse, HttpTransport, Md5Verifier, StorageError, TransportError,
    UpdateStorage, UpdateWriter,
};

#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub declared_len: Option<u64>,
    /// Fail body reads once this many bytes were delivered
    pub fail_after: Option<usize>,
}

impl Route {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            status: 200,
            headers: Vec::new(),
            declared_len: Some(body.len() as u64),
            body,
            fail_after: None,
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self::status(301).header("Location", location)
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            declared_len: None,
            fail_after: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn declared_len(mut self, len: Option<u64>) -> Self {
        self.declared_len = len;
        self
    }

    pub fn fail_after(mut self, bytes: usize) -> Self {
        self.fail_after = Some(bytes);
        self
    }
}

pub struct MockResponse {
    route: Route,
    body: Cursor<Vec<u8>>,
}

impl Read for MockResponse {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(limit) = self.route.fail_after {
            let delivered = self.body.position() as usize;
            if delivered >= limit {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
            }
            let max = (limit - delivered).min(buf.len());
            return self.body.read(&mut buf[..max]);
        }
        self.body.read(buf)
    }
}

impl HttpResponse for MockResponse {
    fn status(&self) -> u16 {
        self.route.status
    }

    fn header(&self, name: &str) -> Option<String> {
        self.route
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    fn content_length(&self) -> Option<u64> {
        self.route.declared_len
    }
}

/// Serves canned routes and records every requested URL
#[derive(Debug, Default)]
pub struct MockHttp {
    routes: HashMap<String, Route>,
    pub requests: Vec<String>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, route: Route) -> Self {
        self.routes.insert(url.to_string(), route);
        self
    }

    pub fn requested(&self, url: &str) -> bool {
        self.requests.iter().any(|r| r == url)
    }
}

impl HttpTransport for MockHttp {
    type Response = MockResponse;

    fn get(&mut self, url: &str) -> Result<MockResponse, TransportError> {
        self.requests.push(url.to_string());
        let route = self
            .routes
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Connection(format!("connection refused: {}", url)))?;
        Ok(MockResponse {
            body: Cursor::new(route.body.clone()),
            route,
        })
    }
}

/// In-memory update slot that checks the registered MD5 on finalize
#[derive(Debug)]
pub struct MockStorage {
    pub capacity: u64,
    pub reject_checksum: bool,
    /// Fail the write that would push the image past this many bytes
    pub fail_write_at: Option<u64>,
    pub driver_error_on_finalize: Option<String>,
    pub expected: Option<Checksum>,
    pub sessions_opened: usize,
    pub aborted: usize,
    pub image: Option<Vec<u8>>,
}

impl MockStorage {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            reject_checksum: false,
            fail_write_at: None,
            driver_error_on_finalize: None,
            expected: None,
            sessions_opened: 0,
            aborted: 0,
            image: None,
        }
    }

    pub fn committed(&self) -> bool {
        self.image.is_some()
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new(1024 * 1024)
    }
}

pub struct MockWriter<'a> {
    storage: &'a mut MockStorage,
    size: u64,
    buf: Vec<u8>,
    verifier: Md5Verifier,
    closed: bool,
}

impl UpdateStorage for MockStorage {
    type Writer<'a> = MockWriter<'a>;

    fn set_expected_checksum(&mut self, checksum: &Checksum) -> Result<(), StorageError> {
        if self.reject_checksum {
            return Err(StorageError::Checksum(checksum.to_string()));
        }
        self.expected = Some(checksum.clone());
        Ok(())
    }

    fn begin(&mut self, size: u64) -> Result<MockWriter<'_>, StorageError> {
        if size > self.capacity {
            return Err(StorageError::InsufficientSpace {
                needed: size,
                available: self.capacity,
            });
        }
        self.sessions_opened += 1;
        Ok(MockWriter {
            storage: self,
            size,
            buf: Vec::new(),
            verifier: Md5Verifier::new(),
            closed: false,
        })
    }
}

impl UpdateWriter for MockWriter<'_> {
    fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        let after = self.buf.len() as u64 + chunk.len() as u64;
        if self.storage.fail_write_at.is_some_and(|limit| after > limit) || after > self.size {
            return Err(StorageError::Write(format!("write past {} bytes", self.buf.len())));
        }
        self.verifier.update(chunk);
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    fn finalize(mut self) -> Result<(), StorageError> {
        self.closed = true;

        if let Some(message) = self.storage.driver_error_on_finalize.clone() {
            self.storage.aborted += 1;
            return Err(StorageError::Driver(message));
        }
        if self.buf.len() as u64 != self.size {
            self.storage.aborted += 1;
            return Err(StorageError::Finalize("image incomplete".to_string()));
        }

        let verifier = std::mem::take(&mut self.verifier);
        if let Some(expected) = self.storage.expected.clone() {
            if let Err(e) = verifier.verify(&expected) {
                self.storage.aborted += 1;
                return Err(StorageError::Finalize(e.to_string()));
            }
        }

        self.storage.image = Some(std::mem::take(&mut self.buf));
        Ok(())
    }
}

impl Drop for MockWriter<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.storage.aborted += 1;
        }
    }
}

/// Raised through `panic_any` in place of a real reset
#[derive(Debug)]
pub struct RestartRequested;

#[derive(Debug)]
pub struct MockDevice {
    pub connected: bool,
    pub now_ms: u64,
    pub restarts: usize,
}

impl MockDevice {
    pub fn online() -> Self {
        Self {
            connected: true,
            now_ms: 0,
            restarts: 0,
        }
    }

    pub fn offline() -> Self {
        Self {
            connected: false,
            ..Self::online()
        }
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }
}

impl Device for MockDevice {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn restart(&mut self) -> ! {
        self.restarts += 1;
        std::panic::panic_any(RestartRequested)
    }
}

/// Run `f`, returning `true` if it ended by restarting the device.
pub fn ends_in_restart<R>(f: impl FnOnce() -> R) -> bool {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(_) => false,
        Err(payload) => payload.downcast_ref::<RestartRequested>().is_some(),
    }
}

/// Firmware bytes with a recognizable pattern
pub fn firmware_image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn md5_of(data: &[u8]) -> Checksum {
    let mut verifier = Md5Verifier::new();
    verifier.update(data);
    verifier.finish()
}
