//! # Error Types
//!
//! Error handling for the media transfer protocol.
//!
//! Every failure that can end a transfer is a variant of [`TransferError`].
//! On the receiving side these never cross the wire: the orchestrator turns
//! them into a single `Failure` status byte and logs the detail locally.
//! On the sending side they propagate to the caller unchanged.
//!
//! ## Error Categories
//! - **I/O Errors**: open/read/write/dial failures, peer hang-ups
//! - **Decode Errors**: bad start marker, truncated or oversized fields
//! - **Integrity Errors**: digest mismatch after reassembly
//! - **Classification Errors**: file extension not in any category
//! - **Storage Errors**: target directory or file could not be written
//!
//! ## Example Usage
//! ```rust
//! use media_transfer::error::{TransferError, Result};
//! use std::fs::File;
//! use std::io::Read;
//! use tracing::{info, error};
//!
//! fn read_source(path: &str) -> Result<Vec<u8>> {
//!     let mut file = File::open(path).map_err(TransferError::Io)?;
//!     let mut contents = Vec::new();
//!     file.read_to_end(&mut contents).map_err(TransferError::Io)?;
//!     Ok(contents)
//! }
//!
//! fn main() {
//!     match read_source("example.txt") {
//!         Ok(contents) => info!(bytes = contents.len(), "Read source file"),
//!         Err(e) => error!(error = %e, "Error reading file"),
//!     }
//! }
//! ```

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Error message constants to keep common log and error text consistent.
pub mod constants {
    /// Transport errors
    pub const ERR_SHORT_DATAGRAM: &str = "Datagram was only partially sent";

    /// Sender-side errors
    pub const ERR_RESPONSE_TIMEOUT: &str = "Timed out waiting for receiver status";
    pub const ERR_NO_FILE_NAME: &str = "Source path has no file name";

    /// Configuration errors
    pub const ERR_CONFIG_OPEN: &str = "Failed to open config file";
    pub const ERR_CONFIG_PARSE: &str = "Failed to parse TOML";
}

/// Primary error type for all transfer operations
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid start marker: 0x{0:02x}")]
    InvalidStartMarker(u8),

    #[error("Frame truncated while reading {field}")]
    Truncated { field: &'static str },

    #[error("File name too long: {0} bytes")]
    FileNameTooLong(usize),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("Hash verification failed: expected {expected}, computed {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("Unsupported file extension: {0:?}")]
    UnknownExtension(String),

    #[error("Failed to create directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write file {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Receiver rejected the file (status {0})")]
    Rejected(u8),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TransferError {
    /// Whether this error came from a malformed or incomplete frame.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            TransferError::InvalidStartMarker(_)
                | TransferError::Truncated { .. }
                | TransferError::FileNameTooLong(_)
                | TransferError::PayloadTooLarge(_)
                | TransferError::InvalidFileName(_)
        )
    }
}

/// Type alias for Results using TransferError
pub type Result<T> = std::result::Result<T, TransferError>;
