//! Observability and Metrics
//!
//! Transfer counters for the receiving side.
//!
//! Uses atomic counters so concurrent connection tasks can record outcomes
//! without locking. A [`Metrics`] value is owned by the server and shared by
//! `Arc`; there is no process-wide instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

use crate::error::TransferError;

/// Counters for one receiver
#[derive(Debug)]
pub struct Metrics {
    /// Transfers whose first bytes arrived
    pub transfers_started: AtomicU64,
    /// Transfers persisted and acknowledged
    pub transfers_succeeded: AtomicU64,
    /// Transfers answered with a failure status
    pub transfers_failed: AtomicU64,
    /// Malformed or incomplete frames, unusable file names included
    pub decode_errors: AtomicU64,
    /// Digest mismatches
    pub integrity_errors: AtomicU64,
    /// Extensions outside every category
    pub classification_errors: AtomicU64,
    /// Directory creation and write failures
    pub storage_errors: AtomicU64,
    /// Connection and socket failures
    pub io_errors: AtomicU64,
    /// Payload bytes persisted
    pub bytes_received: AtomicU64,
    /// Chunk reads performed on the datagram path
    pub chunks_received: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            transfers_started: AtomicU64::new(0),
            transfers_succeeded: AtomicU64::new(0),
            transfers_failed: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            integrity_errors: AtomicU64::new(0),
            classification_errors: AtomicU64::new(0),
            storage_errors: AtomicU64::new(0),
            io_errors: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            chunks_received: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a transfer starting
    pub fn transfer_started(&self) {
        self.transfers_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a persisted transfer
    pub fn transfer_succeeded(&self, byte_count: u64) {
        self.transfers_succeeded.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a failed transfer under the counter for its error kind
    pub fn transfer_failed(&self, error: &TransferError) {
        self.transfers_failed.fetch_add(1, Ordering::Relaxed);

        let counter = match error {
            e if e.is_decode() => &self.decode_errors,
            TransferError::IntegrityMismatch { .. } => &self.integrity_errors,
            TransferError::UnknownExtension(_) => &self.classification_errors,
            TransferError::Directory { .. } | TransferError::Persist { .. } => {
                &self.storage_errors
            }
            _ => &self.io_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record chunk reads for one datagram transfer
    pub fn chunks_received(&self, count: u64) {
        self.chunks_received.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transfers_started: self.transfers_started.load(Ordering::Relaxed),
            transfers_succeeded: self.transfers_succeeded.load(Ordering::Relaxed),
            transfers_failed: self.transfers_failed.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            integrity_errors: self.integrity_errors.load(Ordering::Relaxed),
            classification_errors: self.classification_errors.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            transfers_started = snapshot.transfers_started,
            transfers_succeeded = snapshot.transfers_succeeded,
            transfers_failed = snapshot.transfers_failed,
            decode_errors = snapshot.decode_errors,
            integrity_errors = snapshot.integrity_errors,
            classification_errors = snapshot.classification_errors,
            storage_errors = snapshot.storage_errors,
            io_errors = snapshot.io_errors,
            bytes_received = snapshot.bytes_received,
            chunks_received = snapshot.chunks_received,
            uptime_seconds = snapshot.uptime_seconds,
            "Transfer metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub transfers_started: u64,
    pub transfers_succeeded: u64,
    pub transfers_failed: u64,
    pub decode_errors: u64,
    pub integrity_errors: u64,
    pub classification_errors: u64,
    pub storage_errors: u64,
    pub io_errors: u64,
    pub bytes_received: u64,
    pub chunks_received: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_are_bucketed() {
        let metrics = Metrics::new();
        metrics.transfer_failed(&TransferError::Truncated { field: "payload" });
        metrics.transfer_failed(&TransferError::UnknownExtension(".exe".into()));
        metrics.transfer_failed(&TransferError::IntegrityMismatch {
            expected: "aa".into(),
            actual: "bb".into(),
        });
        metrics.transfer_failed(&TransferError::ConnectionClosed);
        metrics.transfer_failed(&TransferError::InvalidFileName("../x.png".into()));
        metrics.transfer_succeeded(42);

        let snap = metrics.snapshot();
        assert_eq!(snap.transfers_failed, 5);
        assert_eq!(snap.decode_errors, 2);
        assert_eq!(snap.classification_errors, 1);
        assert_eq!(snap.integrity_errors, 1);
        assert_eq!(snap.io_errors, 1);
        assert_eq!(snap.transfers_succeeded, 1);
        assert_eq!(snap.bytes_received, 42);
    }
}
