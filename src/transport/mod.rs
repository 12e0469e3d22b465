//! # Transport Layer
//!
//! The two channels a frame can travel over.
//!
//! ## Channels
//! - **Stream** ([`stream`]): TCP, one connection per transfer, boundaries from
//!   the frame's length prefixes
//! - **Datagram** ([`datagram`]): UDP, one datagram per field, payload chunked
//!   by the sender and reassembled by declared length
//!
//! Both channels end a transfer with the same single status byte.

pub mod datagram;
pub mod stream;

use std::net::SocketAddr;

use tokio::net::{lookup_host, UdpSocket};

use crate::error::{Result, TransferError};

/// Resolve `host:port`, preferring an IPv4 address when both families exist
pub async fn resolve(addr: &str) -> Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = lookup_host(addr).await?.collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| {
            TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("No address found for {addr}"),
            ))
        })
}

/// Bind an ephemeral UDP socket in the same family as `target`
pub async fn bind_ephemeral_udp(target: SocketAddr) -> Result<UdpSocket> {
    let local: SocketAddr = if target.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    UdpSocket::bind(local)
        .await
        .map_err(|source| TransferError::Bind {
            addr: local,
            source,
        })
}
