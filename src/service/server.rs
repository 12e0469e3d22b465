//! # Transfer Server
//!
//! Runs the TCP and UDP listeners side by side.
//!
//! - **TCP**: every accepted connection gets its own task; connections share
//!   nothing but the read-only file sink and the atomic metrics.
//! - **UDP**: one long-lived socket served by a single task, one transfer at a
//!   time. A slow sender holds up every other datagram transfer.
//!
//! Binding either listener is the only fatal error. Per-transfer failures are
//! logged and answered with a failure status; the listeners keep going.

use std::net::SocketAddr;
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use crate::config::TransferConfig;
use crate::core::frame::FrameLimits;
use crate::error::{Result, TransferError};
use crate::protocol::receiver::Receiver;
use crate::storage::{FileSink, MediaStore};
use crate::transport::datagram::DatagramChannel;
use crate::transport::resolve;
use crate::transport::stream::StreamChannel;
use crate::utils::metrics::Metrics;

/// Both listeners, bound and ready to serve
pub struct TransferServer<F = MediaStore> {
    receiver: Receiver<F>,
    tcp: TcpListener,
    udp: DatagramChannel<UdpSocket>,
    limits: FrameLimits,
}

impl TransferServer<MediaStore> {
    /// Bind both listeners with a [`MediaStore`] built from `config.storage`
    pub async fn bind(config: &TransferConfig) -> Result<Self> {
        let store = MediaStore::from_config(&config.storage)?;
        Self::bind_with_sink(config, Arc::new(store)).await
    }
}

impl<F: FileSink> TransferServer<F> {
    /// Bind both listeners with a caller-provided sink
    #[instrument(skip_all, fields(host = %config.server.host))]
    pub async fn bind_with_sink(config: &TransferConfig, sink: Arc<F>) -> Result<Self> {
        let limits = FrameLimits::from(&config.transport);

        let tcp_addr = resolve(&config.server.tcp_address()).await?;
        let tcp = TcpListener::bind(tcp_addr)
            .await
            .map_err(|source| TransferError::Bind {
                addr: tcp_addr,
                source,
            })?;

        let udp_addr = resolve(&config.server.udp_address()).await?;
        let udp = bind_udp(udp_addr, config.server.recv_buffer_size)?;

        info!(
            tcp = %tcp.local_addr()?,
            udp = %udp.local_addr()?,
            chunk_size = config.transport.chunk_size,
            "Listeners bound"
        );

        Ok(Self {
            receiver: Receiver::new(sink),
            tcp,
            udp: DatagramChannel::new(udp, config.transport.chunk_size, limits),
            limits,
        })
    }

    pub fn tcp_addr(&self) -> Result<SocketAddr> {
        Ok(self.tcp.local_addr()?)
    }

    pub fn udp_addr(&self) -> Result<SocketAddr> {
        Ok(self.udp.socket().local_addr()?)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(self.receiver.metrics())
    }

    /// Serve until ctrl-c
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.run_with_shutdown(shutdown_rx).await
    }

    /// Serve until `shutdown_rx` yields or its senders are dropped.
    ///
    /// New TCP connections stop being accepted; connection tasks already
    /// running finish on their own. The UDP task is stopped immediately.
    pub async fn run_with_shutdown(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let Self {
            receiver,
            tcp,
            udp,
            limits,
        } = self;

        let udp_receiver = receiver.clone();
        let udp_task = tokio::spawn(async move {
            loop {
                // Failures are logged and answered inside serve_datagram
                let _ = udp_receiver.serve_datagram(&udp).await;
            }
        });

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server");
                    break;
                }

                accept_result = tcp.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            if let Err(e) = stream.set_nodelay(true) {
                                warn!(%peer, error = %e, "Failed to disable Nagle");
                            }
                            let receiver = receiver.clone();
                            tokio::spawn(async move {
                                let channel = StreamChannel::new(stream, limits);
                                let _ = receiver.serve_stream(channel, peer).await;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                        }
                    }
                }
            }
        }

        udp_task.abort();
        receiver.metrics().log_metrics();
        Ok(())
    }
}

/// Bind the UDP listener, asking the OS for a larger receive buffer first
fn bind_udp(addr: SocketAddr, recv_buffer_size: usize) -> Result<UdpSocket> {
    let bind_err = |source| TransferError::Bind { addr, source };

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(bind_err)?;
    if let Err(e) = socket.set_recv_buffer_size(recv_buffer_size) {
        warn!(error = %e, requested = recv_buffer_size, "Could not enlarge UDP receive buffer");
    }
    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(bind_err)
}
