//! # Transfer Client
//!
//! Sends one file to a receiver over the configured transport.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::config::{ClientConfig, TransferConfig, TransportKind};
use crate::core::frame::FrameLimits;
use crate::error::Result;
use crate::protocol::phase::TransferPhase;
use crate::protocol::sender;
use crate::transport::datagram::DatagramChannel;
use crate::transport::stream::StreamChannel;
use crate::transport::{bind_ephemeral_udp, resolve};

/// What a successful send did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub file_name: String,
    pub bytes: usize,
    pub transport: TransportKind,
    /// Payload datagrams sent; UDP only
    pub chunks: Option<usize>,
}

/// Sender bound to one destination
#[derive(Debug, Clone)]
pub struct TransferClient {
    address: String,
    transport: TransportKind,
    chunk_size: usize,
    limits: FrameLimits,
    response_timeout: Option<Duration>,
}

impl TransferClient {
    pub fn new(client: &ClientConfig, chunk_size: usize) -> Self {
        Self {
            address: client.address(),
            transport: client.transport,
            chunk_size,
            limits: FrameLimits::default(),
            response_timeout: client.response_timeout,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        let mut client = Self::new(&config.client, config.transport.chunk_size);
        client.limits = FrameLimits::from(&config.transport);
        client
    }

    /// Override the transport
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Bound the wait for the status byte
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Send the file at `path` and wait for the receiver's verdict
    #[instrument(skip(self, path), fields(address = %self.address, transport = %self.transport, path = %path.as_ref().display()))]
    pub async fn send_file<P: AsRef<Path>>(&self, path: P) -> Result<TransferReport> {
        debug!(phase = %TransferPhase::Idle, "Loading source");
        let frame = sender::load_frame(path.as_ref()).await?;

        debug!(phase = %TransferPhase::Connecting, "Resolving receiver");
        let target = resolve(&self.address).await?;

        let chunks = match self.transport {
            TransportKind::Tcp => {
                let mut channel = StreamChannel::connect(target, self.limits).await?;
                sender::send_stream(&mut channel, &frame, self.response_timeout).await?;
                None
            }
            TransportKind::Udp => {
                let socket = bind_ephemeral_udp(target).await?;
                // Connected so ICMP unreachable surfaces as an error on the reply read
                socket.connect(target).await?;
                let channel = DatagramChannel::new(socket, self.chunk_size, self.limits);
                let summary =
                    sender::send_datagram(&channel, &frame, target, self.response_timeout).await?;
                Some(summary.chunks)
            }
        };

        info!(
            file_name = %frame.file_name(),
            bytes = frame.payload().len(),
            phase = %TransferPhase::Closed,
            "Transfer acknowledged"
        );

        Ok(TransferReport {
            file_name: frame.file_name().to_string(),
            bytes: frame.payload().len(),
            transport: self.transport,
            chunks,
        })
    }
}
