//! # Utility Modules
//!
//! Supporting pieces used throughout the transfer implementation.
//!
//! ## Components
//! - **Integrity**: SHA-256 content digest and comparison
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe transfer counters

pub mod integrity;
pub mod logging;
pub mod metrics;

pub use integrity::ContentDigest;
pub use metrics::{Metrics, MetricsSnapshot};
