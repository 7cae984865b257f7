//! Pipeline events published toward the rendering layer.
//!
//! Controllers and the store emit these over an unbounded channel so a host
//! shell can render reactively without polling. Emission is best-effort; a
//! dropped receiver never fails the pipeline.

use serde::{Deserialize, Serialize};

use crate::error::DeviceKind;
use crate::message::MessageId;

/// Sender half used by components that publish [`PipelineEvent`]s.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<PipelineEvent>;

/// Receiver half consumed by the rendering layer.
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<PipelineEvent>;

/// Creates a connected event channel pair.
pub fn event_channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Phases of one send/respond exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangePhase {
    /// No exchange in flight; the composer accepts input.
    Composing,
    /// Request issued, response pending. Further sends are no-ops.
    Sending,
    /// Response merged into the store.
    Reconciled,
    /// Exchange failed; one assistant error message was appended.
    Failed,
}

/// High-level events published by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A message was appended to the store.
    MessageAppended { id: MessageId },
    /// An already-appended message was patched in place.
    MessagePatched { id: MessageId },
    /// The store contents were replaced from remote history.
    HistoryReplaced { count: usize },
    /// The store was emptied.
    HistoryCleared { removed: usize },
    /// Cosmetic once-per-second recording counter. Display only.
    RecordingTick { seconds: u64 },
    /// A capture session ended in a device error.
    CaptureFailed {
        device: DeviceKind,
        summary: String,
    },
    /// The orchestrator moved to a new exchange phase.
    ExchangePhaseChanged { phase: ExchangePhase },
}
