//! # Sending Orchestrator
//!
//! Loads a file into a frame, hands it to a channel and waits for the single
//! status byte. Nothing is retried: the first error ends the transfer and is
//! returned to the caller.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, instrument};

use crate::core::frame::TransferFrame;
use crate::error::{constants, Result, TransferError};
use crate::protocol::phase::TransferPhase;
use crate::protocol::status::TransferStatus;
use crate::transport::datagram::{DatagramChannel, DatagramSocket, SendSummary};
use crate::transport::stream::StreamChannel;

/// Read `path` fully and build a frame named after its final component
pub async fn load_frame(path: &Path) -> Result<TransferFrame> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            TransferError::InvalidFileName(format!(
                "{}: {}",
                constants::ERR_NO_FILE_NAME,
                path.display()
            ))
        })?
        .to_string();

    let payload = tokio::fs::read(path).await?;
    debug!(file_name = %file_name, bytes = payload.len(), "Source loaded");
    Ok(TransferFrame::new(file_name, payload))
}

/// Turn the receiver's reply into the transfer result
pub fn interpret(status: TransferStatus) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(TransferError::Rejected(status.as_byte()))
    }
}

/// Wait for `reply`, bounded by `timeout` when one is set
pub async fn await_reply<F>(reply: F, timeout: Option<Duration>) -> Result<TransferStatus>
where
    F: Future<Output = Result<TransferStatus>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, reply).await.map_err(|_| {
            debug!(timeout_ms = limit.as_millis() as u64, "{}", constants::ERR_RESPONSE_TIMEOUT);
            TransferError::Timeout
        })?,
        None => reply.await,
    }
}

/// Send a frame over an open stream and wait for the verdict
#[instrument(skip_all, fields(file_name = %frame.file_name(), bytes = frame.payload().len()))]
pub async fn send_stream<T>(
    channel: &mut StreamChannel<T>,
    frame: &TransferFrame,
    timeout: Option<Duration>,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    debug!(phase = %TransferPhase::Sending, "Writing frame");
    channel.send_frame(frame).await?;

    debug!(phase = %TransferPhase::AwaitingResponse, "Waiting for status");
    let status = await_reply(channel.recv_status(), timeout).await?;
    interpret(status)
}

/// Send a frame as datagrams to `target` and wait for the verdict
#[instrument(skip_all, fields(file_name = %frame.file_name(), bytes = frame.payload().len(), %target))]
pub async fn send_datagram<S>(
    channel: &DatagramChannel<S>,
    frame: &TransferFrame,
    target: SocketAddr,
    timeout: Option<Duration>,
) -> Result<SendSummary>
where
    S: DatagramSocket,
{
    debug!(phase = %TransferPhase::Sending, chunk_size = channel.chunk_size(), "Sending datagrams");
    let summary = channel.send_frame(frame, target).await?;

    debug!(phase = %TransferPhase::AwaitingResponse, "Waiting for status");
    let status = await_reply(channel.recv_status(target), timeout).await?;
    interpret(status)?;
    Ok(summary)
}
