//! # Core Protocol Components
//!
//! Frame layout and the codec that reconstructs frames from a byte stream.
//!
//! ## Components
//! - **Frame**: the transfer message (file name, payload, digest) and its wire layout
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [Marker(1)] [NameLen(4)] [Name(N)] [PayloadLen(4)] [Payload(M)] [Digest(32)]
//! ```
//!
//! ## Limits
//! - Declared lengths are checked against [`frame::FrameLimits`] before any allocation
//! - A non-zero start marker is rejected immediately

pub mod codec;
pub mod frame;
