//! Host side of the bridge: executes operations and settles calls.
//!
//! The executor reads serialized envelopes, runs each call on its own task,
//! and reports back only through a [`CallbackSink`]. It never touches the
//! client's registry.
//!
//! - [`fs`] - document file operations
//! - [`download`] - single remote transfers
//! - [`batch`] - bounded-concurrency batch downloads
//! - [`sqlite`] - SQL passthrough

pub mod batch;
pub mod download;
pub mod fs;
pub mod sqlite;


use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub use batch::BatchDownloader;
pub use download::{HttpTransfer, Transfer};
pub use fs::FileSystem;
pub use sqlite::SqliteExecutor;

use crate::bridge::{CallbackSink, Envelope};
use crate::codec::Outcome;
use crate::config::Config;
use crate::error::{Error, RemoteError, Result, ValidationError};
use crate::types::{CorrelationId, DownloadTask, Operation};
use crate::validate;

/// Executes bridge calls against the documents directory, the network and SQLite
pub struct Executor {
    fs: FileSystem,
    sqlite: SqliteExecutor,
    transfer: Arc<dyn Transfer>,
    batch: BatchDownloader,
    callbacks: CallbackSink,
    shutdown_timeout: Duration,
}

impl Executor {
    /// Create an executor fetching over HTTP
    pub fn new(config: &Config, callbacks: CallbackSink) -> Result<Self> {
        let transfer = Arc::new(HttpTransfer::new(
            &config.documents_dir,
            config.download.user_agent.as_deref(),
        )?);
        Ok(Self::with_transfer(config, callbacks, transfer))
    }

    /// Create an executor with a custom [`Transfer`]
    pub fn with_transfer(
        config: &Config,
        callbacks: CallbackSink,
        transfer: Arc<dyn Transfer>,
    ) -> Self {
        Self {
            fs: FileSystem::new(&config.documents_dir),
            sqlite: SqliteExecutor::new(config.database_path()),
            batch: BatchDownloader::new(
                Arc::clone(&transfer),
                config.download.max_concurrent_transfers,
            ),
            transfer,
            callbacks,
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    /// Serve envelopes until `cancel` fires or the client side hangs up
    ///
    /// Calls still running when the loop stops get the configured shutdown
    /// timeout to finish and are aborted after it. The database is closed only
    /// once no call can touch it.
    pub async fn run(
        self: Arc<Self>,
        mut inbound: mpsc::UnboundedReceiver<String>,
        cancel: CancellationToken,
    ) {
        tracing::info!(documents_dir = %self.fs.root().display(), "executor started");
        let mut calls = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("executor shutting down");
                    break;
                }
                message = inbound.recv() => match message {
                    Some(raw) => self.handle(&raw, &mut calls),
                    None => {
                        tracing::info!("client transport closed, executor stopping");
                        break;
                    }
                },
                Some(joined) = calls.join_next(), if !calls.is_empty() => log_join(joined),
            }
        }

        self.drain(&mut calls).await;
        self.sqlite.close().await;
    }

    async fn drain(&self, calls: &mut JoinSet<()>) {
        if calls.is_empty() {
            return;
        }
        tracing::info!(in_flight = calls.len(), "waiting for running calls to finish");

        let finished = tokio::time::timeout(self.shutdown_timeout, async {
            while let Some(joined) = calls.join_next().await {
                log_join(joined);
            }
        })
        .await;

        if finished.is_err() {
            tracing::warn!(
                remaining = calls.len(),
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "timeout waiting for running calls, aborting them"
            );
            calls.shutdown().await;
        }
    }

    fn handle(self: &Arc<Self>, raw: &str, calls: &mut JoinSet<()>) {
        let envelope = match Envelope::from_wire(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed call envelope");
                return;
            }
        };

        let executor = Arc::clone(self);
        calls.spawn(async move {
            let id = envelope.id;
            let outcome = executor.execute(envelope).await;
            if !executor.callbacks.settle(id, &outcome) {
                tracing::debug!(correlation_id = %id, "client gone before settlement");
            }
        });
    }

    /// Execute one call and produce its outcome
    ///
    /// Never fails: unknown channels, bad arguments and execution errors all
    /// come back as [`Outcome::Failure`].
    pub async fn execute(&self, envelope: Envelope) -> Outcome {
        let Some(operation) = Operation::from_channel(&envelope.channel) else {
            tracing::warn!(channel = %envelope.channel, "call on unknown channel");
            let err = Error::from(ValidationError::UnknownOperation(envelope.channel));
            return Outcome::Failure(RemoteError::from(&err));
        };

        if let Err(e) = operation.validate(&envelope.args) {
            tracing::warn!(correlation_id = %envelope.id, operation = %operation, error = %e, "rejecting call arguments");
            return Outcome::Failure(RemoteError::from(&Error::from(e)));
        }

        tracing::debug!(correlation_id = %envelope.id, operation = %operation, "executing call");
        let result = self.perform(operation, envelope.id, &envelope.args).await;
        let outcome = Outcome::from_result(result);
        if let Outcome::Failure(remote) = &outcome {
            tracing::debug!(correlation_id = %envelope.id, operation = %operation, error = %remote, "call failed");
        }
        outcome
    }

    async fn perform(
        &self,
        operation: Operation,
        id: CorrelationId,
        args: &[Value],
    ) -> Result<Outcome> {
        let arg = |index: usize| validate::string_arg(operation.channel(), args, index);

        match operation {
            Operation::Stat => Outcome::value(&self.fs.stat(arg(0)?).await?),
            Operation::Exists => Outcome::value(&self.fs.exists(arg(0)?).await?),
            Operation::ReadFile => {
                let encoding = validate::encoding(arg(1)?)?;
                Ok(Outcome::Value(self.fs.read_file(arg(0)?, encoding).await?.into()))
            }
            Operation::WriteFile => {
                let encoding = validate::encoding(arg(2)?)?;
                self.fs.write_file(arg(0)?, arg(1)?, encoding).await?;
                Ok(Outcome::Empty)
            }
            Operation::Readdir => Outcome::value(&self.fs.readdir(arg(0)?).await?),
            Operation::Unlink => {
                self.fs.unlink(arg(0)?).await?;
                Ok(Outcome::Empty)
            }
            Operation::DownloadToFile => {
                let task = DownloadTask::new(arg(0)?, arg(1)?);
                let written = self.transfer.fetch(&task).await?;
                Ok(Outcome::Value(written.into()))
            }
            Operation::DownloadFiles => {
                let urls = (0..args.len())
                    .map(|index| arg(index).map(str::to_string))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let callbacks = self.callbacks.clone();
                let results = self
                    .batch
                    .download_all(urls, batch::name_from_url, move |completed, total| {
                        callbacks.progress(id, completed, total);
                    })
                    .await;
                Outcome::value(&results)
            }
            Operation::SqliteQuery => Ok(Outcome::Value(self.sqlite.query(arg(0)?).await?)),
        }
    }
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    match joined {
        Err(e) if e.is_panic() => tracing::error!(error = %e, "call task panicked"),
        _ => {}
    }
}
