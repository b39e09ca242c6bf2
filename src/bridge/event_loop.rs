//! The client loop: sole owner of the [`CallbackRegistry`].
//!
//! Dispatch-side registrations and executor-side callbacks arrive on the same
//! FIFO inbox. A call is always registered before its envelope is posted, so
//! its registration is queued ahead of any settlement for it.

use tokio::sync::{mpsc, oneshot};

use super::registry::{CallbackRegistry, PendingCall, ProgressHandler};
use crate::codec::{self, Outcome};
use crate::error::{Error, ProtocolError};
use crate::types::CorrelationId;

/// Messages processed by the client loop
pub(crate) enum LoopMessage {
    /// A new call was dispatched
    Register {
        id: CorrelationId,
        call: PendingCall,
    },
    /// Install or replace a progress handler
    AttachProgress {
        id: CorrelationId,
        handler: ProgressHandler,
    },
    /// The envelope for a registered call could not be posted
    Abandon { id: CorrelationId },
    /// Encoded settlement from the executor
    Settle { id: CorrelationId, payload: String },
    /// Progress report from the executor
    Progress {
        id: CorrelationId,
        completed: u64,
        total: u64,
    },
    /// Registry size query
    PendingCount { reply: oneshot::Sender<usize> },
    /// Reject everything pending and stop
    Shutdown { reply: oneshot::Sender<usize> },
}

/// Executor-facing handle for settling calls and reporting progress
///
/// This is the executor's only way back into the client. Settlements are
/// encoded here and decoded on the client loop, so the boundary is crossed
/// as serialized text in both directions.
#[derive(Clone)]
pub struct CallbackSink {
    inbox: mpsc::UnboundedSender<LoopMessage>,
}

impl CallbackSink {
    pub(crate) fn new(inbox: mpsc::UnboundedSender<LoopMessage>) -> Self {
        Self { inbox }
    }

    /// Encode and deliver the outcome of call `id`
    ///
    /// Returns `false` if the client loop is gone.
    pub fn settle(&self, id: CorrelationId, outcome: &Outcome) -> bool {
        let payload = match codec::encode(outcome) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(correlation_id = %id, error = %e, "failed to encode outcome");
                let fallback = Outcome::Failure(crate::error::RemoteError::internal(format!(
                    "failed to encode outcome: {}",
                    e
                )));
                codec::encode(&fallback).unwrap_or_default()
            }
        };
        self.settle_encoded(id, payload)
    }

    /// Deliver an already-encoded settlement payload for call `id`
    pub fn settle_encoded(&self, id: CorrelationId, payload: String) -> bool {
        self.inbox.send(LoopMessage::Settle { id, payload }).is_ok()
    }

    /// Report `completed` of `total` units done for call `id`
    pub fn progress(&self, id: CorrelationId, completed: u64, total: u64) -> bool {
        self.inbox
            .send(LoopMessage::Progress {
                id,
                completed,
                total,
            })
            .is_ok()
    }
}

/// Run the client loop until shutdown or until every sender is gone
pub(crate) async fn run(mut inbox: mpsc::UnboundedReceiver<LoopMessage>) {
    let mut registry = CallbackRegistry::new();

    while let Some(message) = inbox.recv().await {
        match message {
            LoopMessage::Register { id, call } => {
                if let Err(call) = registry.register(id, call) {
                    tracing::error!(correlation_id = %id, "correlation id collision");
                    call.reject(Error::Protocol(ProtocolError::DuplicateId(id.get())));
                }
            }
            LoopMessage::AttachProgress { id, handler } => {
                if !registry.attach_progress(id, handler) {
                    tracing::debug!(correlation_id = %id, "progress handler attached after settlement");
                }
            }
            LoopMessage::Abandon { id } => {
                registry.abandon(id);
            }
            LoopMessage::Settle { id, payload } => {
                let result = match codec::decode(&payload) {
                    Ok(outcome) => outcome.into_result(),
                    Err(e) => {
                        tracing::warn!(correlation_id = %id, error = %e, "rejecting call with malformed settlement");
                        Err(Error::Protocol(e))
                    }
                };
                registry.settle(id, result);
            }
            LoopMessage::Progress {
                id,
                completed,
                total,
            } => {
                registry.report_progress(id, completed, total);
            }
            LoopMessage::PendingCount { reply } => {
                reply.send(registry.len()).ok();
            }
            LoopMessage::Shutdown { reply } => {
                inbox.close();
                let rejected = registry.reject_all(|| Error::ShuttingDown);
                tracing::debug!(rejected, "bridge loop shutting down");
                reply.send(rejected).ok();
                return;
            }
        }
    }

    registry.reject_all(|| Error::ShuttingDown);
}
