//! Client side of the bridge: dispatcher, registry loop, transport.
//!
//! - [`registry`] - correlation id to pending call table
//! - [`event_loop`] - the loop that owns the registry and applies callbacks
//! - [`transport`] - envelopes and the outbound channel
//! - [`call`] - futures handed back to callers

pub mod call;
pub mod event_loop;
pub mod registry;
pub mod transport;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};

pub use call::{Call, CallHandle};
pub use event_loop::CallbackSink;
pub use registry::{CallbackRegistry, PendingCall, ProgressHandler};
pub use transport::{ChannelTransport, Envelope, Transport};

use crate::codec;
use crate::error::{Error, Result, ValidationError};
use crate::types::{CorrelationId, Encoding, FileStat, Operation, TaskOutcome};
use event_loop::LoopMessage;

/// Dispatcher for calls into the host (cloneable - all fields are shared)
///
/// Each bridge owns its own registry loop, so independent bridges never see
/// each other's calls.
#[derive(Clone)]
pub struct Bridge {
    transport: Arc<dyn Transport>,
    inbox: mpsc::UnboundedSender<LoopMessage>,
    next_id: Arc<AtomicU64>,
}

impl Bridge {
    /// Create a bridge posting through `transport`
    ///
    /// Spawns the registry loop on the current tokio runtime and returns the
    /// [`CallbackSink`] the executor uses to settle calls.
    pub fn new(transport: Arc<dyn Transport>) -> (Self, CallbackSink) {
        let (inbox, rx) = mpsc::unbounded_channel();
        tokio::spawn(event_loop::run(rx));

        let bridge = Self {
            transport,
            inbox: inbox.clone(),
            next_id: Arc::new(AtomicU64::new(1)),
        };
        (bridge, CallbackSink::new(inbox))
    }

    /// Invoke the operation posted on `channel`
    ///
    /// Arguments are validated before anything else happens; a
    /// [`ValidationError`] leaves the registry untouched. Host-side failures
    /// arrive later, as a rejection of the returned handle.
    pub fn invoke(&self, channel: &str, args: Vec<Value>) -> Result<CallHandle> {
        let operation = Self::checked(channel, &args)?;
        self.dispatch(operation, args, None)
    }

    /// Like [`invoke`](Self::invoke), with a progress handler registered
    /// together with the call
    pub fn invoke_with_progress<F>(
        &self,
        channel: &str,
        args: Vec<Value>,
        handler: F,
    ) -> Result<CallHandle>
    where
        F: FnMut(u64, u64) + Send + 'static,
    {
        let operation = Self::checked(channel, &args)?;
        self.dispatch(operation, args, Some(Box::new(handler)))
    }

    fn checked(channel: &str, args: &[Value]) -> Result<Operation> {
        let operation = Operation::from_channel(channel)
            .ok_or_else(|| ValidationError::UnknownOperation(channel.to_string()))?;
        operation.validate(args)?;
        Ok(operation)
    }

    fn dispatch(
        &self,
        operation: Operation,
        args: Vec<Value>,
        progress: Option<ProgressHandler>,
    ) -> Result<CallHandle> {
        let id = CorrelationId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (settle_tx, settle_rx) = oneshot::channel();
        let mut call = PendingCall::new(operation, settle_tx);
        if let Some(handler) = progress {
            call = call.with_progress(handler);
        }

        self.inbox
            .send(LoopMessage::Register { id, call })
            .map_err(|_| Error::ShuttingDown)?;

        let envelope = Envelope {
            channel: operation.channel().to_string(),
            id,
            args,
        };
        if let Err(e) = self.transport.post(&envelope) {
            tracing::warn!(correlation_id = %id, operation = %operation, error = %e, "failed to post call envelope");
            self.inbox.send(LoopMessage::Abandon { id }).ok();
            return Err(e);
        }

        tracing::debug!(correlation_id = %id, operation = %operation, "call dispatched");
        Ok(CallHandle::new(id, settle_rx, self.inbox.clone()))
    }

    fn typed<T>(&self, operation: Operation, args: Vec<Value>) -> Result<Call<T>> {
        operation.validate(&args)?;
        Ok(Call::new(self.dispatch(operation, args, None)?))
    }

    /// Number of calls dispatched but not yet settled
    pub async fn pending_calls(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(LoopMessage::PendingCount { reply })
            .map_err(|_| Error::ShuttingDown)?;
        rx.await.map_err(|_| Error::ShuttingDown)
    }

    /// Reject every pending call with [`Error::ShuttingDown`] and stop the loop
    ///
    /// Returns how many calls were rejected. Later calls fail with
    /// `ShuttingDown` at dispatch.
    pub async fn shutdown(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(LoopMessage::Shutdown { reply })
            .map_err(|_| Error::ShuttingDown)?;
        rx.await.map_err(|_| Error::ShuttingDown)
    }

    /// Stat a document
    pub fn stat(&self, name: &str) -> Result<Call<FileStat>> {
        self.typed(Operation::Stat, vec![json!(name)])
    }

    /// Check whether a document exists
    pub fn exists(&self, name: &str) -> Result<Call<bool>> {
        self.typed(Operation::Exists, vec![json!(name)])
    }

    /// Read a document; `Base64` returns the bytes base64-encoded
    pub fn read_file(&self, path: &str, encoding: Encoding) -> Result<Call<String>> {
        self.typed(Operation::ReadFile, vec![json!(path), json!(encoding.as_str())])
    }

    /// Write `contents` to a document, replacing it
    ///
    /// Content always travels base64-encoded, so any bytes are accepted.
    pub fn write_file(&self, name: &str, contents: impl AsRef<[u8]>) -> Result<Call<()>> {
        let data = codec::encode_content(contents.as_ref(), Encoding::Base64)?;
        self.typed(
            Operation::WriteFile,
            vec![json!(name), json!(data), json!(Encoding::Base64.as_str())],
        )
    }

    /// List a documents directory (`""` for the root)
    pub fn readdir(&self, dir: &str) -> Result<Call<Vec<String>>> {
        self.typed(Operation::Readdir, vec![json!(dir)])
    }

    /// Delete a document
    pub fn unlink(&self, name: &str) -> Result<Call<()>> {
        self.typed(Operation::Unlink, vec![json!(name)])
    }

    /// Download one remote URL into a document; resolves with bytes written
    pub fn download_to_file(&self, url: &str, name: &str) -> Result<Call<u64>> {
        self.typed(Operation::DownloadToFile, vec![json!(url), json!(name)])
    }

    /// Download many remote URLs, each saved under its URL basename
    ///
    /// Results arrive in completion order. The call never rejects because of an
    /// individual transfer; check each [`TaskOutcome`].
    pub fn download_files(&self, urls: &[&str]) -> Result<Call<Vec<TaskOutcome>>> {
        let args = urls.iter().map(|url| json!(url)).collect();
        self.typed(Operation::DownloadFiles, args)
    }

    /// [`download_files`](Self::download_files) with a progress handler that
    /// sees every `(completed, total)` report
    pub fn download_files_with_progress<F>(
        &self,
        urls: &[&str],
        handler: F,
    ) -> Result<Call<Vec<TaskOutcome>>>
    where
        F: FnMut(u64, u64) + Send + 'static,
    {
        let args: Vec<Value> = urls.iter().map(|url| json!(url)).collect();
        Operation::DownloadFiles.validate(&args)?;
        Ok(Call::new(self.dispatch(
            Operation::DownloadFiles,
            args,
            Some(Box::new(handler)),
        )?))
    }

    /// Run one SQL statement; resolves with an array of row objects
    pub fn sqlite(&self, sql: &str) -> Result<Call<Value>> {
        self.typed(Operation::SqliteQuery, vec![json!(sql)])
    }
}
