//! # Media Transfer
//!
//! Single-file transfer over TCP or UDP with SHA-256 integrity verification.
//!
//! A sender reads a whole file, computes its digest, and ships one frame:
//!
//! ```text
//! [0x00] [NameLen u32] [Name] [PayloadLen u32] [Payload] [SHA-256(32)]
//! ```
//!
//! The receiver rebuilds the frame, sorts the file into a category directory by
//! extension, checks the digest, writes the file, and answers with one status
//! byte: `1` for success, `0` for failure.
//!
//! ## Layers
//! - [`core`]: frame layout and stream codec
//! - [`transport`]: stream and datagram channels
//! - [`protocol`]: sender and receiver control flow
//! - [`service`]: listeners and the sending client
//! - [`storage`]: classification and persistence
//! - [`config`], [`error`], [`utils`]: configuration, errors, digest, logging, metrics
//!
//! ## Example
//! ```no_run
//! use media_transfer::config::TransferConfig;
//! use media_transfer::service::{TransferClient, TransferServer};
//!
//! # async fn run() -> media_transfer::error::Result<()> {
//! let config = TransferConfig::load_or_default("media-transfer.toml")?;
//! config.validate_strict()?;
//!
//! let server = TransferServer::bind(&config).await?;
//! tokio::spawn(server.run());
//!
//! let report = TransferClient::from_config(&config)
//!     .send_file("photo.png")
//!     .await?;
//! println!("sent {} bytes", report.bytes);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod storage;
pub mod transport;
pub mod utils;

pub use crate::config::{TransferConfig, TransportKind};
pub use crate::core::frame::TransferFrame;
pub use crate::error::{Result, TransferError};
pub use crate::protocol::status::TransferStatus;
