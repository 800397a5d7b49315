use std::io;
use std::time::Duration;

use embedded_svc::http::Method;
use esp_idf_svc::http::client::{Configuration as HttpConfig, EspHttpConnection, FollowRedirectsPolicy};
use ota_core::{HttpResponse, HttpTransport, TransportError};

const BUFFER_SIZE: usize = 4096;

/// HTTP(S) client over ESP-IDF's `esp_http_client`.
///
/// Every request gets its own connection. Redirects are returned to the
/// caller rather than followed, and TLS peers are checked against the
/// bundled CA certificates.
pub struct EspHttpTransport {
    timeout: Duration,
}

impl EspHttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for EspHttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

pub struct EspHttpResponse {
    conn: EspHttpConnection,
}

impl HttpTransport for EspHttpTransport {
    type Response = EspHttpResponse;

    fn get(&mut self, url: &str) -> Result<EspHttpResponse, TransportError> {
        let config = HttpConfig {
            buffer_size: Some(BUFFER_SIZE),
            timeout: Some(self.timeout),
            follow_redirects_policy: FollowRedirectsPolicy::FollowNone,
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };

        let mut conn = EspHttpConnection::new(&config).map_err(|e| {
            log::debug!("esp_http_client init failed: {}", e);
            TransportError::Init(url.to_string())
        })?;

        conn.initiate_request(Method::Get, url, &[])
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        conn.initiate_response()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(EspHttpResponse { conn })
    }
}

impl io::Read for EspHttpResponse {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.conn
            .read(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

impl HttpResponse for EspHttpResponse {
    fn status(&self) -> u16 {
        self.conn.status()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.conn.header(name).map(str::to_string)
    }

    fn content_length(&self) -> Option<u64> {
        self.conn
            .header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }
}
