//! # Integrity
//!
//! SHA-256 content digests for transfer payloads.
//!
//! The digest is the only integrity check in the protocol: the sender computes
//! it before transmission and the receiver re-derives it once the whole payload
//! has been reassembled. A mismatch is final; nothing is retried or repaired.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::{Result, TransferError};

/// Length of a content digest in bytes
pub const DIGEST_LEN: usize = 32;

/// A SHA-256 digest of a transfer payload
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Wrap raw digest bytes as received from the wire
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex rendering, used in log records and error text
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the digest of a payload
pub fn digest(payload: &[u8]) -> ContentDigest {
    ContentDigest(Sha256::digest(payload).into())
}

/// Compare a locally computed digest with the one carried by the frame
pub fn verify(computed: &ContentDigest, received: &ContentDigest) -> Result<()> {
    if computed == received {
        Ok(())
    } else {
        Err(TransferError::IntegrityMismatch {
            expected: received.to_hex(),
            actual: computed.to_hex(),
        })
    }
}
