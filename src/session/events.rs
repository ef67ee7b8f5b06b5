//! Structured session events for host applications.
//!
//! Every operation gets a UUID v4 operation id; all events it produces carry
//! that id so a subscriber can correlate them with log lines.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::blockchain::types::Signature;
use crate::session::state::ConnectionStatus;

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// The four session operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Connect,
    Disconnect,
    RefreshBalance,
    SendTransfer,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Disconnect => "disconnect",
            Operation::RefreshBalance => "refresh_balance",
            Operation::SendTransfer => "send_transfer",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change a display layer may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    StatusChanged {
        operation_id: Uuid,
        from: ConnectionStatus,
        to: ConnectionStatus,
    },
    BalanceUpdated {
        operation_id: Uuid,
        lamports: u64,
    },
    TransferSubmitted {
        operation_id: Uuid,
        signature: Signature,
    },
    TransferConfirmed {
        operation_id: Uuid,
        signature: Signature,
    },
    OperationFailed {
        operation_id: Uuid,
        operation: Operation,
        kind: &'static str,
        message: String,
    },
}

impl SessionEvent {
    pub fn operation_id(&self) -> Uuid {
        match self {
            SessionEvent::StatusChanged { operation_id, .. }
            | SessionEvent::BalanceUpdated { operation_id, .. }
            | SessionEvent::TransferSubmitted { operation_id, .. }
            | SessionEvent::TransferConfirmed { operation_id, .. }
            | SessionEvent::OperationFailed { operation_id, .. } => *operation_id,
        }
    }
}

/// Broadcast fan-out of session events.
///
/// Publishing never blocks; slow subscribers observe `RecvError::Lagged`.
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
