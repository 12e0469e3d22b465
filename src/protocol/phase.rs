use std::fmt;

/// Where a transfer is in its lifecycle.
///
/// ```text
/// Idle -> Connecting -> Sending | Receiving -> Verifying -> Persisting
///      -> AwaitingResponse (sender) | Responding (receiver) -> Closed
/// ```
///
/// Verifying and Persisting only occur on the receiving side. The phase is
/// carried in log records so a failure can be traced to the step that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Idle,
    Connecting,
    Sending,
    Receiving,
    Verifying,
    Persisting,
    AwaitingResponse,
    Responding,
    Closed,
}

impl TransferPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferPhase::Idle => "idle",
            TransferPhase::Connecting => "connecting",
            TransferPhase::Sending => "sending",
            TransferPhase::Receiving => "receiving",
            TransferPhase::Verifying => "verifying",
            TransferPhase::Persisting => "persisting",
            TransferPhase::AwaitingResponse => "awaiting_response",
            TransferPhase::Responding => "responding",
            TransferPhase::Closed => "closed",
        }
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
