//! Bounded-concurrency batch downloads with per-completion progress.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use super::download::Transfer;
use crate::codec::Outcome;
use crate::error::{RemoteError, RemoteErrorKind, Result};
use crate::paths;
use crate::types::{DownloadTask, TaskOutcome};
use crate::validate;

/// Downloads many URLs, at most `concurrency` at a time
pub struct BatchDownloader {
    transfer: Arc<dyn Transfer>,
    concurrency: usize,
}

/// Completion bookkeeping for one batch
///
/// Only the batch's consumer loop touches this, so the counter and the result
/// list need no synchronization.
struct BatchState {
    total: u64,
    completed: u64,
    results: Vec<TaskOutcome>,
}

impl BatchState {
    fn new(total: usize) -> Self {
        Self {
            total: total as u64,
            completed: 0,
            results: Vec::with_capacity(total),
        }
    }

    fn record(&mut self, outcome: TaskOutcome) {
        self.completed += 1;
        self.results.push(outcome);
    }

    fn is_complete(&self) -> bool {
        self.completed == self.total
    }

    fn into_results(self) -> Vec<TaskOutcome> {
        self.results
    }
}

impl BatchDownloader {
    /// Create a downloader with the given ceiling (clamped to at least 1)
    pub fn new(transfer: Arc<dyn Transfer>, concurrency: usize) -> Self {
        Self {
            transfer,
            concurrency: concurrency.max(1),
        }
    }

    /// Maximum transfers in flight
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Download every URL, saving each under the name `namer` derives for it
    ///
    /// A URL the namer rejects becomes a failed task without being fetched,
    /// and so does any URL whose name an earlier URL in the list already took.
    /// `progress(completed, total)` is called once per finished task, success
    /// or failure, before the next result is taken. Results come back in
    /// completion order, one per URL. An empty list returns immediately
    /// without reporting progress.
    pub async fn download_all<N, P>(
        &self,
        urls: Vec<String>,
        namer: N,
        mut progress: P,
    ) -> Vec<TaskOutcome>
    where
        N: Fn(&str) -> Result<String>,
        P: FnMut(u64, u64),
    {
        if urls.is_empty() {
            return Vec::new();
        }

        let limit = self.concurrency.min(urls.len());
        let mut state = BatchState::new(urls.len());
        tracing::debug!(total = state.total, concurrency = limit, "starting batch download");

        let mut claimed = HashSet::new();
        let mut finished = stream::iter(urls)
            .map(|url| {
                let named = namer(&url).and_then(|name| claim(&mut claimed, name));
                run_task(Arc::clone(&self.transfer), url, named)
            })
            .buffer_unordered(limit);

        while let Some(outcome) = finished.next().await {
            state.record(outcome);
            progress(state.completed, state.total);
        }

        debug_assert!(state.is_complete());
        let results = state.into_results();
        let failed = results.iter().filter(|r| !r.is_success()).count();
        tracing::info!(total = results.len(), failed, "batch download finished");
        results
    }
}

/// Default namer: the last non-empty path segment of the URL
pub fn name_from_url(url: &str) -> Result<String> {
    let name = paths::url_basename(url).ok_or_else(|| {
        RemoteError::new(
            RemoteErrorKind::InvalidInput,
            format!("cannot derive a file name from '{}'", url),
        )
    })?;
    validate::basename(&name)?;
    Ok(name)
}

/// Reserve `name` for this batch; a name already reserved is refused
fn claim(claimed: &mut HashSet<String>, name: String) -> Result<String> {
    if !claimed.insert(name.clone()) {
        return Err(RemoteError::new(
            RemoteErrorKind::AlreadyExists,
            format!("'{}' is already the destination of an earlier url in this batch", name),
        )
        .into());
    }
    Ok(name)
}

/// Run one transfer on its own task and fold the result into a [`TaskOutcome`]
async fn run_task(
    transfer: Arc<dyn Transfer>,
    url: String,
    named: Result<String>,
) -> TaskOutcome {
    let destination = match named {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "skipping url without a usable destination");
            return TaskOutcome {
                url,
                destination: None,
                outcome: Outcome::Failure(RemoteError::from(&e)),
            };
        }
    };

    let task = DownloadTask::new(url.clone(), destination.clone());
    let joined = tokio::spawn(async move { transfer.fetch(&task).await }).await;

    let outcome = match joined {
        Ok(Ok(bytes)) => Outcome::Value(bytes.into()),
        Ok(Err(e)) => {
            tracing::warn!(url = %url, error = %e, "transfer failed");
            Outcome::Failure(RemoteError::from(&e))
        }
        Err(e) => {
            tracing::error!(url = %url, error = %e, "transfer task panicked");
            Outcome::Failure(RemoteError::internal(format!("transfer task failed: {}", e)))
        }
    };

    TaskOutcome {
        url,
        destination: Some(destination),
        outcome,
    }
}
