//! # Datagram Transport
//!
//! Frame exchange over UDP with manual chunking and size-driven reassembly.
//!
//! ## Send order
//! Every field travels as its own datagram:
//! ```text
//! [Marker] [NameLen] [Name] [PayloadLen] [Chunk 0] .. [Chunk n-1] [Digest]
//! ```
//! Chunks are `chunk_size` bytes except the last, which carries the remainder.
//!
//! ## Receive
//! The first datagram fixes the peer; everything after it is read as one
//! ordered byte sequence from that peer. The payload is rebuilt by reading
//! `min(chunk_size, remaining)` bytes until the declared total is reached.
//! There are no sequence numbers: loss or reordering corrupts the payload,
//! which the digest check then rejects, or stalls the read indefinitely.
//!
//! Reassembly only sees the [`ByteSource`] trait, so a stricter source
//! (sequence numbers, reordering, retransmission) can replace [`PeerReader`]
//! without touching the frame layout or the orchestrator.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use crate::core::frame::{
    check_marker, parse_digest, parse_file_name, parse_length, reserve_hint, FrameLimits,
    TransferFrame, LENGTH_PREFIX_LEN, START_MARKER,
};
use crate::error::{constants, Result, TransferError};
use crate::protocol::status::TransferStatus;
use crate::utils::integrity::DIGEST_LEN;

/// Receive buffer size; large enough for any UDP datagram
const RECV_BUFFER_LEN: usize = 64 * 1024;

/// Message-oriented socket the datagram channel runs over
pub trait DatagramSocket: Send + Sync {
    fn send_to(
        &self,
        buf: &[u8],
        target: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send;

    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

impl DatagramSocket for UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

/// Ordered source of bytes for one transfer
pub trait ByteSource: Send {
    /// Return exactly `len` bytes, or fail
    fn read_exact(
        &mut self,
        len: usize,
        field: &'static str,
    ) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Reads the datagrams of one transfer from a pinned peer.
///
/// Datagrams from any other address are dropped. Bytes beyond what the
/// current read needs are kept for the next read, so the result does not
/// depend on how the sender split its datagrams.
pub struct PeerReader<'a, S> {
    socket: &'a S,
    peer: SocketAddr,
    pending: BytesMut,
    recv_buf: Vec<u8>,
    datagrams: usize,
    dropped: usize,
}

impl<'a, S: DatagramSocket> PeerReader<'a, S> {
    /// Wait for the first datagram of a transfer and pin its sender
    pub async fn accept(socket: &'a S) -> Result<Self> {
        let mut recv_buf = vec![0u8; RECV_BUFFER_LEN];
        let (n, peer) = socket.recv_from(&mut recv_buf).await?;

        let mut pending = BytesMut::with_capacity(n.max(LENGTH_PREFIX_LEN));
        pending.extend_from_slice(&recv_buf[..n]);
        debug!(peer = %peer, bytes = n, "Transfer started");

        Ok(Self {
            socket,
            peer,
            pending,
            recv_buf,
            datagrams: 1,
            dropped: 0,
        })
    }

    /// Address replies go to
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Datagrams accepted from the peer so far
    pub fn datagrams(&self) -> usize {
        self.datagrams
    }

    /// Datagrams dropped because they came from another address
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    async fn fill(&mut self) -> Result<()> {
        loop {
            let (n, from) = self.socket.recv_from(&mut self.recv_buf).await?;
            if from != self.peer {
                self.dropped += 1;
                warn!(peer = %self.peer, from = %from, "Dropping datagram from another sender");
                continue;
            }
            self.datagrams += 1;
            trace!(bytes = n, "Datagram received");
            self.pending.extend_from_slice(&self.recv_buf[..n]);
            return Ok(());
        }
    }
}

impl<S: DatagramSocket> ByteSource for PeerReader<'_, S> {
    async fn read_exact(&mut self, len: usize, _field: &'static str) -> Result<Bytes> {
        while self.pending.len() < len {
            self.fill().await?;
        }
        Ok(self.pending.split_to(len).freeze())
    }
}

/// Payload rebuilt from chunk reads
#[derive(Debug, Clone)]
pub struct Reassembled {
    pub payload: Bytes,
    /// Number of chunk reads it took
    pub chunk_reads: usize,
}

/// Read `total_len` bytes from `source` in reads of at most `chunk_size`
pub async fn reassemble<B: ByteSource>(
    source: &mut B,
    total_len: usize,
    chunk_size: usize,
) -> Result<Reassembled> {
    if chunk_size == 0 {
        return Err(TransferError::ConfigError(
            "Chunk size must be greater than 0".to_string(),
        ));
    }

    let mut payload = BytesMut::with_capacity(reserve_hint(total_len));
    let mut chunk_reads = 0;

    while payload.len() < total_len {
        let want = chunk_size.min(total_len - payload.len());
        let chunk = source.read_exact(want, "payload").await?;
        payload.extend_from_slice(&chunk);
        chunk_reads += 1;
    }

    Ok(Reassembled {
        payload: payload.freeze(),
        chunk_reads,
    })
}

/// A frame read off the datagram path
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub frame: TransferFrame,
    pub chunk_reads: usize,
}

/// Datagram counts for one sent frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSummary {
    /// Total datagrams sent, header fields included
    pub datagrams: usize,
    /// Datagrams that carried payload
    pub chunks: usize,
}

/// Split a payload into the chunks the sender emits, in order
pub fn chunk_payload(payload: &[u8], chunk_size: usize) -> std::slice::Chunks<'_, u8> {
    payload.chunks(chunk_size.max(1))
}

/// UDP side of the protocol, shared by sender and receiver
#[derive(Debug)]
pub struct DatagramChannel<S> {
    socket: S,
    chunk_size: usize,
    limits: FrameLimits,
}

impl<S: DatagramSocket> DatagramChannel<S> {
    pub fn new(socket: S, chunk_size: usize, limits: FrameLimits) -> Self {
        Self {
            socket,
            chunk_size: chunk_size.max(1),
            limits,
        }
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    async fn send_datagram(&self, buf: &[u8], target: SocketAddr) -> Result<()> {
        let sent = self.socket.send_to(buf, target).await?;
        if sent != buf.len() {
            return Err(io::Error::new(io::ErrorKind::WriteZero, constants::ERR_SHORT_DATAGRAM).into());
        }
        Ok(())
    }

    /// Send one frame to `target`, one datagram per field and per chunk
    pub async fn send_frame(&self, frame: &TransferFrame, target: SocketAddr) -> Result<SendSummary> {
        frame.check_encodable()?;

        let name = frame.file_name().as_bytes();
        let payload = frame.payload();
        let mut datagrams = 0;

        self.send_datagram(&[START_MARKER], target).await?;
        self.send_datagram(&(name.len() as u32).to_be_bytes(), target)
            .await?;
        datagrams += 2;

        if !name.is_empty() {
            self.send_datagram(name, target).await?;
            datagrams += 1;
        }

        self.send_datagram(&(payload.len() as u32).to_be_bytes(), target)
            .await?;
        datagrams += 1;

        let mut chunks = 0;
        for chunk in chunk_payload(payload, self.chunk_size) {
            self.send_datagram(chunk, target).await?;
            chunks += 1;
        }
        datagrams += chunks;

        self.send_datagram(frame.digest().as_bytes(), target).await?;
        datagrams += 1;

        debug!(datagrams, chunks, "Frame sent");
        Ok(SendSummary { datagrams, chunks })
    }

    /// Wait for the first datagram of the next transfer
    pub async fn accept(&self) -> Result<PeerReader<'_, S>> {
        PeerReader::accept(&self.socket).await
    }

    /// Read the rest of a frame from an accepted peer
    pub async fn read_frame<B: ByteSource>(&self, source: &mut B) -> Result<ReceivedFrame> {
        let marker = source.read_exact(1, "start marker").await?;
        check_marker(marker[0])?;

        let name_len = parse_length(&source.read_exact(LENGTH_PREFIX_LEN, "file name length").await?)?
            as usize;
        self.limits.check_file_name_len(name_len)?;
        let file_name = parse_file_name(&source.read_exact(name_len, "file name").await?)?;

        let total_len = parse_length(&source.read_exact(LENGTH_PREFIX_LEN, "payload length").await?)?
            as usize;
        self.limits.check_payload_len(total_len)?;

        let Reassembled {
            payload,
            chunk_reads,
        } = reassemble(source, total_len, self.chunk_size).await?;

        let digest = parse_digest(&source.read_exact(DIGEST_LEN, "digest").await?)?;

        Ok(ReceivedFrame {
            frame: TransferFrame::from_parts(file_name, payload, digest),
            chunk_reads,
        })
    }

    /// Send the status byte to `peer`
    pub async fn send_status(&self, status: TransferStatus, peer: SocketAddr) -> Result<()> {
        self.send_datagram(&[status.as_byte()], peer).await
    }

    /// Wait for the status byte from `peer`, ignoring anything else
    pub async fn recv_status(&self, peer: SocketAddr) -> Result<TransferStatus> {
        let mut buf = [0u8; 16];
        loop {
            let (n, from) = self.socket.recv_from(&mut buf).await?;
            if from != peer {
                warn!(expected = %peer, from = %from, "Ignoring datagram from another address");
                continue;
            }
            if n == 0 {
                continue;
            }
            return Ok(TransferStatus::from_byte(buf[0]));
        }
    }
}
