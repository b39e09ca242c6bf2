//! Host application wiring: one bridge, one executor, one documents directory.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::{Bridge, ChannelTransport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{Executor, Transfer};
use crate::resources;

/// A running bridge together with its host executor
///
/// Created with [`AppView::start`]; stop it with [`AppView::shutdown`] so
/// pending calls are rejected rather than left hanging.
pub struct AppView {
    bridge: Bridge,
    config: Config,
    cancel: CancellationToken,
    executor_task: JoinHandle<()>,
}

impl AppView {
    /// Validate `config`, prepare the documents directory and start serving
    pub async fn start(config: Config) -> Result<Self> {
        Self::start_inner(config, None).await
    }

    /// Like [`start`](Self::start), fetching remote content through `transfer`
    pub async fn start_with_transfer(config: Config, transfer: Arc<dyn Transfer>) -> Result<Self> {
        Self::start_inner(config, Some(transfer)).await
    }

    async fn start_inner(config: Config, transfer: Option<Arc<dyn Transfer>>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.documents_dir)
            .await
            .map_err(|e| Error::Config {
                message: format!(
                    "failed to create documents directory {}: {}",
                    config.documents_dir.display(),
                    e
                ),
                key: Some("documents_dir".to_string()),
            })?;

        if let Some(source) = &config.resources.source_dir {
            resources::copy_web_resources(source, &config.documents_dir).await?;
        }

        let (transport, inbound) = ChannelTransport::new();
        let (bridge, callbacks) = Bridge::new(Arc::new(transport));
        let executor = match transfer {
            Some(transfer) => Executor::with_transfer(&config, callbacks, transfer),
            None => Executor::new(&config, callbacks)?,
        };

        let cancel = CancellationToken::new();
        let executor_task = tokio::spawn(Arc::new(executor).run(inbound, cancel.clone()));

        tracing::info!(
            documents_dir = %config.documents_dir.display(),
            max_concurrent_transfers = config.download.max_concurrent_transfers,
            "app view started"
        );

        Ok(Self {
            bridge,
            config,
            cancel,
            executor_task,
        })
    }

    /// The client-side dispatcher
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Root of every file operation
    pub fn documents_dir(&self) -> &Path {
        &self.config.documents_dir
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reject pending calls, stop the executor and wait for it to exit
    ///
    /// Returns how many calls were still pending.
    pub async fn shutdown(self) -> Result<usize> {
        let rejected = self.bridge.shutdown().await?;
        self.cancel.cancel();
        if let Err(e) = self.executor_task.await {
            tracing::error!(error = %e, "executor task panicked");
        }
        tracing::info!(rejected, "app view stopped");
        Ok(rejected)
    }
}
