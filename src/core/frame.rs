//! # Transfer Frame
//!
//! The unit of exchange: one file name, one payload, one digest.
//!
//! ## Wire Format
//! ```text
//! [Marker(1)=0x00] [NameLen(4)] [Name(N)] [PayloadLen(4)] [Payload(M)] [Digest(32)]
//! ```
//! All integers are big-endian. There is no padding, version field or
//! trailing delimiter; the length prefixes and the fixed digest size are the
//! only source of message boundaries.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::config::{TransportConfig, DEFAULT_MAX_FILE_NAME_LEN, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::error::{Result, TransferError};
use crate::utils::integrity::{self, ContentDigest, DIGEST_LEN};

/// First byte of every frame
pub const START_MARKER: u8 = 0x00;

/// Size of each u32 length prefix
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Bytes before the file name: marker + name length
pub const HEADER_LEN: usize = 1 + LENGTH_PREFIX_LEN;

/// Smallest possible frame: empty name, empty payload
pub const MIN_FRAME_LEN: usize = HEADER_LEN + LENGTH_PREFIX_LEN + DIGEST_LEN;

/// Most a receiver reserves ahead of bytes that have actually arrived
pub const MAX_RESERVE: usize = 64 * 1024;

/// Capacity to reserve for `remaining` declared bytes
pub fn reserve_hint(remaining: usize) -> usize {
    remaining.min(MAX_RESERVE)
}

/// Bounds a receiver applies to declared lengths before allocating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    pub max_file_name_len: usize,
    pub max_payload_size: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_file_name_len: DEFAULT_MAX_FILE_NAME_LEN,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl From<&TransportConfig> for FrameLimits {
    fn from(config: &TransportConfig) -> Self {
        Self {
            max_file_name_len: config.max_file_name_len,
            max_payload_size: config.max_payload_size,
        }
    }
}

impl FrameLimits {
    /// Reject a declared file name length above the limit
    pub fn check_file_name_len(&self, len: usize) -> Result<()> {
        if len > self.max_file_name_len {
            return Err(TransferError::FileNameTooLong(len));
        }
        Ok(())
    }

    /// Reject a declared payload length above the limit
    pub fn check_payload_len(&self, len: usize) -> Result<()> {
        if len > self.max_payload_size {
            return Err(TransferError::PayloadTooLarge(len));
        }
        Ok(())
    }
}

/// One file in flight
///
/// Built once by the sender (which computes the digest) or reassembled by the
/// receiver from wire fields. Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFrame {
    file_name: String,
    payload: Bytes,
    digest: ContentDigest,
}

impl TransferFrame {
    /// Build a frame for sending, computing the payload digest
    pub fn new(file_name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let digest = integrity::digest(&payload);
        Self {
            file_name: file_name.into(),
            payload,
            digest,
        }
    }

    /// Assemble a frame from decoded fields without checking the digest
    pub fn from_parts(
        file_name: impl Into<String>,
        payload: impl Into<Bytes>,
        digest: ContentDigest,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            payload: payload.into(),
            digest,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    /// Consume the frame, returning its name, payload and digest
    pub fn into_parts(self) -> (String, Bytes, ContentDigest) {
        (self.file_name, self.payload, self.digest)
    }

    /// Recompute the payload digest and compare it with the carried one
    pub fn verify(&self) -> Result<()> {
        integrity::verify(&integrity::digest(&self.payload), &self.digest)
    }

    /// Exact number of bytes this frame occupies on a stream
    pub fn encoded_len(&self) -> usize {
        MIN_FRAME_LEN + self.file_name.len() + self.payload.len()
    }

    /// Check that both variable-length fields fit a u32 prefix
    pub fn check_encodable(&self) -> Result<()> {
        if u32::try_from(self.file_name.len()).is_err() {
            return Err(TransferError::FileNameTooLong(self.file_name.len()));
        }
        if u32::try_from(self.payload.len()).is_err() {
            return Err(TransferError::PayloadTooLarge(self.payload.len()));
        }
        Ok(())
    }

    /// Append everything that precedes the payload: marker, name, payload length
    pub fn encode_header(&self, dst: &mut BytesMut) -> Result<()> {
        self.check_encodable()?;
        dst.reserve(HEADER_LEN + self.file_name.len() + LENGTH_PREFIX_LEN);
        dst.put_u8(START_MARKER);
        dst.put_u32(self.file_name.len() as u32);
        dst.put_slice(self.file_name.as_bytes());
        dst.put_u32(self.payload.len() as u32);
        Ok(())
    }

    /// Append the encoded frame to `dst`
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(self.encoded_len());
        self.encode_header(dst)?;
        dst.put_slice(&self.payload);
        dst.put_slice(self.digest.as_bytes());
        Ok(())
    }

    /// Encode the frame into a fresh buffer
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a frame from a buffer that holds exactly one complete frame
    pub fn from_bytes(data: &[u8], limits: &FrameLimits) -> Result<Self> {
        let mut buf = data;

        check_marker(take_u8(&mut buf, "start marker")?)?;

        let name_len = take_u32(&mut buf, "file name length")? as usize;
        limits.check_file_name_len(name_len)?;
        let file_name = parse_file_name(take_slice(&mut buf, name_len, "file name")?)?;

        let payload_len = take_u32(&mut buf, "payload length")? as usize;
        limits.check_payload_len(payload_len)?;
        let payload = Bytes::copy_from_slice(take_slice(&mut buf, payload_len, "payload")?);

        let digest = parse_digest(take_slice(&mut buf, DIGEST_LEN, "digest")?)?;

        Ok(Self::from_parts(file_name, payload, digest))
    }
}

/// Enforce the start marker value
pub fn check_marker(byte: u8) -> Result<()> {
    if byte != START_MARKER {
        return Err(TransferError::InvalidStartMarker(byte));
    }
    Ok(())
}

/// Interpret file name bytes as UTF-8 text
pub fn parse_file_name(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| TransferError::InvalidFileName(String::from_utf8_lossy(e.as_bytes()).into()))
}

/// Read a big-endian u32 length prefix
pub fn parse_length(bytes: &[u8]) -> Result<u32> {
    let raw: [u8; LENGTH_PREFIX_LEN] = bytes.try_into().map_err(|_| TransferError::Truncated {
        field: "length prefix",
    })?;
    Ok(u32::from_be_bytes(raw))
}

/// Read the trailing 32-byte digest
pub fn parse_digest(bytes: &[u8]) -> Result<ContentDigest> {
    let raw: [u8; DIGEST_LEN] = bytes
        .try_into()
        .map_err(|_| TransferError::Truncated { field: "digest" })?;
    Ok(ContentDigest::from_bytes(raw))
}

fn take_u8(buf: &mut &[u8], field: &'static str) -> Result<u8> {
    if buf.remaining() < 1 {
        return Err(TransferError::Truncated { field });
    }
    Ok(buf.get_u8())
}

fn take_u32(buf: &mut &[u8], field: &'static str) -> Result<u32> {
    if buf.remaining() < LENGTH_PREFIX_LEN {
        return Err(TransferError::Truncated { field });
    }
    Ok(buf.get_u32())
}

fn take_slice<'a>(buf: &mut &'a [u8], len: usize, field: &'static str) -> Result<&'a [u8]> {
    if buf.len() < len {
        return Err(TransferError::Truncated { field });
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}
