//! Callback registry - the single place where pending calls live and settle.
//!
//! The registry has no interior locking. It is owned by the bridge's client loop
//! (see [`super::event_loop`]); every executor-side completion is marshaled onto
//! that loop before it touches the table.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::types::{CorrelationId, Operation};

/// What a waiting caller receives: a value, no value, or an error
pub type CallResult = Result<Option<serde_json::Value>>;

/// Progress observer, called with `(completed, total)`
pub type ProgressHandler = Box<dyn FnMut(u64, u64) + Send>;

/// A dispatched call awaiting settlement
pub struct PendingCall {
    operation: Operation,
    settle: oneshot::Sender<CallResult>,
    progress: Option<ProgressHandler>,
}

impl PendingCall {
    /// Create a pending call with a no-op progress handler
    pub fn new(operation: Operation, settle: oneshot::Sender<CallResult>) -> Self {
        Self {
            operation,
            settle,
            progress: None,
        }
    }

    /// Attach a progress handler at registration time
    pub fn with_progress(mut self, handler: ProgressHandler) -> Self {
        self.progress = Some(handler);
        self
    }

    /// Operation the call was dispatched for
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Settle this call with an error without it ever entering a registry
    pub fn reject(self, err: Error) {
        self.settle.send(Err(err)).ok();
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("operation", &self.operation)
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}

/// Table from correlation id to pending call
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    pending: HashMap<CorrelationId, PendingCall>,
}

impl CallbackRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call under `id`
    ///
    /// Fails, handing the call back, if `id` is already pending.
    pub fn register(
        &mut self,
        id: CorrelationId,
        call: PendingCall,
    ) -> std::result::Result<(), PendingCall> {
        if self.pending.contains_key(&id) {
            return Err(call);
        }
        self.pending.insert(id, call);
        Ok(())
    }

    /// Remove `id` and deliver its result
    ///
    /// Returns `false` when `id` is unknown, which covers a duplicate settlement
    /// from the host; that second settlement has no effect.
    pub fn settle(&mut self, id: CorrelationId, result: CallResult) -> bool {
        let Some(call) = self.pending.remove(&id) else {
            tracing::warn!(correlation_id = %id, "settlement for unknown or already settled call ignored");
            return false;
        };

        tracing::debug!(
            correlation_id = %id,
            operation = %call.operation,
            ok = result.is_ok(),
            "call settled"
        );
        if call.settle.send(result).is_err() {
            tracing::debug!(correlation_id = %id, "caller dropped its handle before settlement");
        }
        true
    }

    /// Forward a progress report to the call's handler, if it has one
    pub fn report_progress(&mut self, id: CorrelationId, completed: u64, total: u64) -> bool {
        match self.pending.get_mut(&id) {
            Some(PendingCall {
                progress: Some(handler),
                ..
            }) => {
                handler(completed, total);
                true
            }
            Some(_) => false,
            None => {
                tracing::warn!(correlation_id = %id, completed, total, "progress for unknown call ignored");
                false
            }
        }
    }

    /// Install or replace the progress handler of a pending call
    pub fn attach_progress(&mut self, id: CorrelationId, handler: ProgressHandler) -> bool {
        match self.pending.get_mut(&id) {
            Some(call) => {
                call.progress = Some(handler);
                true
            }
            None => false,
        }
    }

    /// Drop a registration whose envelope never left the client
    pub fn abandon(&mut self, id: CorrelationId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Reject every pending call, emptying the registry
    pub fn reject_all(&mut self, reason: impl Fn() -> Error) -> usize {
        let count = self.pending.len();
        for (id, call) in self.pending.drain() {
            tracing::debug!(correlation_id = %id, operation = %call.operation, "rejecting pending call");
            call.reject(reason());
        }
        count
    }

    /// Number of pending calls
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no call is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether `id` is pending
    pub fn contains(&self, id: CorrelationId) -> bool {
        self.pending.contains_key(&id)
    }
}
