//! # Services
//!
//! The two ends a program actually runs: a [`TransferServer`] that listens on
//! both transports, and a [`TransferClient`] that sends one file.

pub mod client;
pub mod server;

pub use client::{TransferClient, TransferReport};
pub use server::TransferServer;
