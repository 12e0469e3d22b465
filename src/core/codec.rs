//! # Frame Codec
//!
//! Tokio codec that reconstructs [`TransferFrame`]s from a byte stream.
//!
//! Decoding is incremental: the decoder peeks at the length prefixes, grows the
//! buffer toward the frame size a bounded step at a time, and only splits a frame off once every
//! byte of it has arrived. A stream that ends in the middle of a frame yields
//! [`TransferError::Truncated`] naming the field that was cut short.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::frame::{
    check_marker, parse_digest, parse_file_name, reserve_hint, FrameLimits, TransferFrame,
    HEADER_LEN, LENGTH_PREFIX_LEN,
};
use crate::error::{Result, TransferError};
use crate::utils::integrity::DIGEST_LEN;

/// Codec for length-prefixed transfer frames
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec {
    limits: FrameLimits,
}

impl FrameCodec {
    pub fn new(limits: FrameLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &FrameLimits {
        &self.limits
    }
}

/// Name of the first field that `src` does not fully contain
fn pending_field(src: &[u8]) -> &'static str {
    if src.is_empty() {
        return "start marker";
    }
    if src.len() < HEADER_LEN {
        return "file name length";
    }
    let name_len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
    let payload_len_at = HEADER_LEN + name_len;
    if src.len() < payload_len_at {
        return "file name";
    }
    if src.len() < payload_len_at + LENGTH_PREFIX_LEN {
        return "payload length";
    }
    let p = payload_len_at;
    let payload_len = u32::from_be_bytes([src[p], src[p + 1], src[p + 2], src[p + 3]]) as usize;
    if src.len() < p + LENGTH_PREFIX_LEN + payload_len {
        "payload"
    } else {
        "digest"
    }
}

impl Decoder for FrameCodec {
    type Item = TransferFrame;
    type Error = TransferError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.is_empty() {
            return Ok(None);
        }

        // Reject garbage before waiting on any length prefix
        check_marker(src[0])?;

        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let name_len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        self.limits.check_file_name_len(name_len)?;

        let payload_len_at = HEADER_LEN + name_len;
        if src.len() < payload_len_at + LENGTH_PREFIX_LEN {
            src.reserve(reserve_hint(payload_len_at + LENGTH_PREFIX_LEN - src.len()));
            return Ok(None);
        }

        let p = payload_len_at;
        let payload_len =
            u32::from_be_bytes([src[p], src[p + 1], src[p + 2], src[p + 3]]) as usize;
        self.limits.check_payload_len(payload_len)?;

        let total = p + LENGTH_PREFIX_LEN + payload_len + DIGEST_LEN;
        if src.len() < total {
            src.reserve(reserve_hint(total - src.len()));
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(HEADER_LEN);
        let file_name = parse_file_name(&frame.split_to(name_len))?;
        frame.advance(LENGTH_PREFIX_LEN);
        let payload = frame.split_to(payload_len).freeze();
        let digest = parse_digest(&frame)?;

        Ok(Some(TransferFrame::from_parts(file_name, payload, digest)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(TransferError::Truncated {
                field: pending_field(src),
            }),
        }
    }
}

impl Encoder<TransferFrame> for FrameCodec {
    type Error = TransferError;

    fn encode(&mut self, item: TransferFrame, dst: &mut BytesMut) -> Result<()> {
        item.encode_into(dst)
    }
}

impl Encoder<&TransferFrame> for FrameCodec {
    type Error = TransferError;

    fn encode(&mut self, item: &TransferFrame, dst: &mut BytesMut) -> Result<()> {
        item.encode_into(dst)
    }
}
