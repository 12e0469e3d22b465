//! # Receiving Orchestrator
//!
//! Runs one inbound transfer from first byte to status reply.
//!
//! ```text
//! decode -> classify -> ensure directory -> verify digest -> persist -> reply
//! ```
//!
//! Any error along the way ends the transfer with a `Failure` status byte and
//! an `error!` record naming the phase it happened in; nothing is written to
//! disk unless the digest matched. Errors never escape as a reason to stop
//! listening: callers get them back for inspection only.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, field, info, instrument, warn, Span};

use crate::core::frame::TransferFrame;
use crate::error::Result;
use crate::protocol::phase::TransferPhase;
use crate::protocol::status::TransferStatus;
use crate::storage::FileSink;
use crate::transport::datagram::{DatagramChannel, DatagramSocket};
use crate::transport::stream::StreamChannel;
use crate::utils::metrics::{Metrics, Timer};

/// A file the receiver has written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_name: String,
    pub category: String,
    pub path: PathBuf,
    pub bytes: usize,
    /// Chunk reads it took to rebuild the payload; datagram path only
    pub chunk_reads: Option<usize>,
}

/// Receiving side of the protocol, shared by every listener task
pub struct Receiver<F> {
    sink: Arc<F>,
    metrics: Arc<Metrics>,
}

impl<F> Clone for Receiver<F> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<F: FileSink> Receiver<F> {
    pub fn new(sink: Arc<F>) -> Self {
        Self::with_metrics(sink, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(sink: Arc<F>, metrics: Arc<Metrics>) -> Self {
        Self { sink, metrics }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Classify, verify and persist a decoded frame
    pub async fn store(&self, frame: TransferFrame) -> Result<StoredFile> {
        let mut phase = TransferPhase::Verifying;
        self.store_in_phase(frame, &mut phase).await
    }

    async fn store_in_phase(
        &self,
        frame: TransferFrame,
        phase: &mut TransferPhase,
    ) -> Result<StoredFile> {
        // Verifying covers both classification and the digest check
        *phase = TransferPhase::Verifying;
        let placement = self.sink.classify(frame.file_name())?;
        self.sink.ensure_directory(&placement.directory).await?;
        frame.verify()?;

        *phase = TransferPhase::Persisting;
        let path = placement.path_for(frame.file_name());
        self.sink.persist(&path, frame.payload()).await?;

        info!(
            path = %path.display(),
            category = %placement.category,
            bytes = frame.payload().len(),
            "File stored"
        );

        let bytes = frame.payload().len();
        let (file_name, _, _) = frame.into_parts();
        Ok(StoredFile {
            file_name,
            category: placement.category,
            path,
            bytes,
            chunk_reads: None,
        })
    }

    fn record(&self, result: &Result<StoredFile>, phase: TransferPhase) -> TransferStatus {
        match result {
            Ok(stored) => {
                self.metrics.transfer_succeeded(stored.bytes as u64);
                TransferStatus::Success
            }
            Err(e) => {
                self.metrics.transfer_failed(e);
                error!(error = %e, phase = %phase, "Transfer failed");
                TransferStatus::Failure
            }
        }
    }

    /// Serve one transfer on an accepted stream connection.
    ///
    /// The status byte is always attempted, and the write half is shut down
    /// before returning.
    #[instrument(skip_all, fields(peer = %peer))]
    pub async fn serve_stream<T>(
        &self,
        mut channel: StreamChannel<T>,
        peer: SocketAddr,
    ) -> Result<StoredFile>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        self.metrics.transfer_started();
        let _timer = Timer::start("stream_transfer");
        let mut phase = TransferPhase::Receiving;

        let result = match channel.recv_frame().await {
            Ok(frame) => {
                debug!(file_name = %frame.file_name(), bytes = frame.payload().len(), "Frame received");
                self.store_in_phase(frame, &mut phase).await
            }
            Err(e) => Err(e),
        };

        let status = self.record(&result, phase);
        if let Err(e) = channel.send_status(status).await {
            warn!(error = %e, phase = %TransferPhase::Responding, "Failed to send status");
        }
        if let Err(e) = channel.shutdown().await {
            debug!(error = %e, "Shutdown after reply failed");
        }

        debug!(phase = %TransferPhase::Closed, %status, "Connection done");
        result
    }

    /// Wait for and serve the next transfer on a datagram channel.
    ///
    /// Transfers are served one at a time: nothing else is read from the
    /// socket until this one has been answered.
    #[instrument(skip_all, fields(peer = field::Empty))]
    pub async fn serve_datagram<S>(&self, channel: &DatagramChannel<S>) -> Result<StoredFile>
    where
        S: DatagramSocket,
    {
        let mut reader = match channel.accept().await {
            Ok(reader) => reader,
            Err(e) => {
                warn!(error = %e, "Datagram receive failed");
                return Err(e);
            }
        };
        let peer = reader.peer();
        Span::current().record("peer", field::display(peer));

        self.metrics.transfer_started();
        let _timer = Timer::start("datagram_transfer");
        let mut phase = TransferPhase::Receiving;

        let result = match channel.read_frame(&mut reader).await {
            Ok(received) => {
                self.metrics.chunks_received(received.chunk_reads as u64);
                debug!(
                    file_name = %received.frame.file_name(),
                    bytes = received.frame.payload().len(),
                    chunk_reads = received.chunk_reads,
                    datagrams = reader.datagrams(),
                    "Frame reassembled"
                );
                self.store_in_phase(received.frame, &mut phase)
                    .await
                    .map(|stored| StoredFile {
                        chunk_reads: Some(received.chunk_reads),
                        ..stored
                    })
            }
            Err(e) => Err(e),
        };

        if reader.dropped() > 0 {
            warn!(dropped = reader.dropped(), "Datagrams from other senders were dropped");
        }

        let status = self.record(&result, phase);
        if let Err(e) = channel.send_status(status, peer).await {
            warn!(error = %e, phase = %TransferPhase::Responding, "Failed to send status");
        }

        result
    }
}
