//! # Stream Transport
//!
//! Frame exchange over a reliable, ordered byte stream.
//!
//! The channel is generic over any `AsyncRead + AsyncWrite` connection, so the
//! same code serves TCP sockets in production and `tokio::io::duplex` pipes in
//! tests. Message boundaries come only from the frame's own length prefixes.
//!
//! ## Responsibilities
//! - Write a frame field by field, looping until every byte is accepted
//! - Read exactly one frame, failing on any short read
//! - Exchange the single status byte that ends every transfer

use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::FramedRead;
use tracing::{debug, instrument, warn};

use crate::core::codec::FrameCodec;
use crate::core::frame::{FrameLimits, TransferFrame};
use crate::error::{Result, TransferError};
use crate::protocol::status::TransferStatus;

/// A connection carrying one transfer
#[derive(Debug)]
pub struct StreamChannel<T> {
    io: T,
    codec: FrameCodec,
}

impl StreamChannel<TcpStream> {
    /// Dial a TCP receiver
    #[instrument(skip(addr))]
    pub async fn connect<A: ToSocketAddrs>(addr: A, limits: FrameLimits) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to disable Nagle");
        }
        Ok(Self::new(stream, limits))
    }
}

impl<T> StreamChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: T, limits: FrameLimits) -> Self {
        Self {
            io,
            codec: FrameCodec::new(limits),
        }
    }

    /// Write one frame: header, payload, digest
    pub async fn send_frame(&mut self, frame: &TransferFrame) -> Result<()> {
        let mut header = BytesMut::new();
        frame.encode_header(&mut header)?;

        // write_all loops over partial writes
        self.io.write_all(&header).await?;
        self.io.write_all(frame.payload()).await?;
        self.io.write_all(frame.digest().as_bytes()).await?;
        self.io.flush().await?;

        debug!(bytes = frame.encoded_len(), "Frame written");
        Ok(())
    }

    /// Read exactly one frame
    pub async fn recv_frame(&mut self) -> Result<TransferFrame> {
        let mut framed = FramedRead::new(&mut self.io, self.codec);

        match framed.next().await {
            Some(Ok(frame)) => {
                if !framed.read_buffer().is_empty() {
                    warn!(
                        extra = framed.read_buffer().len(),
                        "Discarding bytes received after the frame"
                    );
                }
                Ok(frame)
            }
            Some(Err(e)) => Err(e),
            None => Err(TransferError::ConnectionClosed),
        }
    }

    /// Send the status byte
    pub async fn send_status(&mut self, status: TransferStatus) -> Result<()> {
        self.io.write_all(&[status.as_byte()]).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Read the status byte
    pub async fn recv_status(&mut self) -> Result<TransferStatus> {
        let mut reply = [0u8; 1];
        match self.io.read_exact(&mut reply).await {
            Ok(_) => Ok(TransferStatus::from_byte(reply[0])),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(TransferError::ConnectionClosed)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Close the write half so the peer sees end-of-stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_frame_over_duplex() {
        let (a, b) = duplex(64);
        let mut sender = StreamChannel::new(a, FrameLimits::default());
        let mut receiver = StreamChannel::new(b, FrameLimits::default());

        let frame = TransferFrame::new("movie.avi", vec![0x5Au8; 10_000]);
        let expected = frame.clone();

        let send = tokio::spawn(async move {
            sender.send_frame(&frame).await.unwrap();
            sender.recv_status().await.unwrap()
        });

        let got = receiver.recv_frame().await.unwrap();
        assert_eq!(got, expected);
        receiver.send_status(TransferStatus::Success).await.unwrap();

        assert_eq!(send.await.unwrap(), TransferStatus::Success);
    }

    #[tokio::test]
    async fn test_short_stream_is_truncated() {
        let (mut a, b) = duplex(1024);
        let frame = TransferFrame::new("a.txt", b"0123456789".to_vec());
        let bytes = frame.to_bytes().unwrap();
        a.write_all(&bytes[..bytes.len() - 3]).await.unwrap();
        drop(a);

        let mut receiver = StreamChannel::new(b, FrameLimits::default());
        assert!(matches!(
            receiver.recv_frame().await,
            Err(TransferError::Truncated { field: "digest" })
        ));
    }

    #[tokio::test]
    async fn test_empty_stream_is_closed() {
        let (a, b) = duplex(16);
        drop(a);
        let mut receiver = StreamChannel::new(b, FrameLimits::default());
        assert!(matches!(
            receiver.recv_frame().await,
            Err(TransferError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_missing_reply_is_closed() {
        let (a, b) = duplex(16);
        drop(b);
        let mut sender = StreamChannel::new(a, FrameLimits::default());
        assert!(sender.recv_status().await.is_err());
    }
}
