//! # Protocol Layer
//!
//! Per-transfer control flow on both ends of a connection.
//!
//! ## Components
//! - **Sender** ([`sender`]): load, frame, transmit, await the verdict
//! - **Receiver** ([`receiver`]): decode, classify, verify, persist, reply
//! - **Status** ([`status`]): the one-byte verdict
//! - **Phase** ([`phase`]): lifecycle states carried in log records

pub mod phase;
pub mod receiver;
pub mod sender;
pub mod status;

pub use phase::TransferPhase;
pub use receiver::{Receiver, StoredFile};
pub use status::TransferStatus;
