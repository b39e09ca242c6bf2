//! Caller-side futures for dispatched calls.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot};

use super::event_loop::LoopMessage;
use super::registry::CallResult;
use crate::error::{Error, ProtocolError, Result};
use crate::types::CorrelationId;

/// Future for one dispatched call
///
/// Resolves to `Ok(Some(value))`, `Ok(None)` for an empty outcome, or the
/// decoded failure. Dropping the handle does not cancel the call.
#[must_use = "a dispatched call does nothing useful unless awaited"]
pub struct CallHandle {
    id: CorrelationId,
    settled: oneshot::Receiver<CallResult>,
    inbox: mpsc::UnboundedSender<LoopMessage>,
}

impl CallHandle {
    pub(crate) fn new(
        id: CorrelationId,
        settled: oneshot::Receiver<CallResult>,
        inbox: mpsc::UnboundedSender<LoopMessage>,
    ) -> Self {
        Self { id, settled, inbox }
    }

    /// Correlation id of this call
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Register or replace the progress handler for this call
    ///
    /// Reports that reached the client before the handler was installed are
    /// not replayed; use [`Bridge::invoke_with_progress`](super::Bridge::invoke_with_progress)
    /// to observe every report.
    pub fn on_progress<F>(self, handler: F) -> Self
    where
        F: FnMut(u64, u64) + Send + 'static,
    {
        self.inbox
            .send(LoopMessage::AttachProgress {
                id: self.id,
                handler: Box::new(handler),
            })
            .ok();
        self
    }
}

impl Future for CallHandle {
    type Output = CallResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(Pin::new(&mut self.settled).poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(_) => Poll::Ready(Err(Error::ShuttingDown)),
        }
    }
}

/// Typed future for a dispatched call
///
/// Deserializes the settled value into `T`; an empty outcome is presented as
/// JSON `null`, so `Call<()>` and `Call<Option<_>>` accept it.
#[must_use = "a dispatched call does nothing useful unless awaited"]
pub struct Call<T> {
    handle: CallHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Call<T> {
    pub(crate) fn new(handle: CallHandle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    /// Correlation id of this call
    pub fn id(&self) -> CorrelationId {
        self.handle.id()
    }

    /// Register or replace the progress handler for this call
    pub fn on_progress<F>(self, handler: F) -> Self
    where
        F: FnMut(u64, u64) + Send + 'static,
    {
        Self::new(self.handle.on_progress(handler))
    }

    /// Give up typing and return the raw handle
    pub fn into_handle(self) -> CallHandle {
        self.handle
    }
}

impl<T: DeserializeOwned> Future for Call<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let settled = ready!(Pin::new(&mut self.handle).poll(cx))?;
        let value = settled.unwrap_or(serde_json::Value::Null);
        Poll::Ready(
            serde_json::from_value(value)
                .map_err(|e| Error::Protocol(ProtocolError::UnexpectedPayload(e.to_string()))),
        )
    }
}
