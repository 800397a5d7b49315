//! MD5 checksums carried in the manifest and the streaming verifier used by
//! storage backends that cannot check a digest themselves.

use core::fmt;

use md5::{Digest, Md5};
use thiserror::Error;

/// Length of a hex-encoded MD5 digest
pub const CHECKSUM_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChecksumError {
    #[error("checksum must be 32 characters long, got {0}")]
    Length(usize),

    #[error("checksum contains non-hex characters")]
    NotHex,

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}

/// Lower-case hex MD5 digest, exactly 32 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum(heapless::String<CHECKSUM_LEN>);

impl Checksum {
    pub fn parse(text: &str) -> Result<Self, ChecksumError> {
        let text = text.trim();
        if text.len() != CHECKSUM_LEN {
            return Err(ChecksumError::Length(text.len()));
        }

        let mut digest = [0u8; CHECKSUM_LEN / 2];
        hex::decode_to_slice(text, &mut digest).map_err(|_| ChecksumError::NotHex)?;
        Ok(Self::from_digest(&digest))
    }

    fn from_digest(digest: &[u8; CHECKSUM_LEN / 2]) -> Self {
        let mut buf = [0u8; CHECKSUM_LEN];
        // 16 digest bytes always fill the 32-byte buffer
        let _ = hex::encode_to_slice(digest, &mut buf);

        let mut hex = heapless::String::new();
        for &b in &buf {
            let _ = hex.push(b as char);
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incremental MD5 over a streamed firmware image.
pub struct Md5Verifier {
    hasher: Md5,
    bytes: u64,
}

impl Md5Verifier {
    pub fn new() -> Self {
        Self {
            hasher: Md5::new(),
            bytes: 0,
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Bytes hashed so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn finish(self) -> Checksum {
        let digest: [u8; CHECKSUM_LEN / 2] = self.hasher.finalize().into();
        Checksum::from_digest(&digest)
    }

    pub fn verify(self, expected: &Checksum) -> Result<(), ChecksumError> {
        let actual = self.finish();
        if &actual == expected {
            Ok(())
        } else {
            Err(ChecksumError::Mismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}

impl Default for Md5Verifier {
    fn default() -> Self {
        Self::new()
    }
}
