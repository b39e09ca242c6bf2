//! Single remote-to-document transfers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;

use crate::error::{Error, RemoteError, Result};
use crate::types::DownloadTask;

/// Abstraction over fetching one remote resource into a document, enabling testability.
#[async_trait::async_trait]
pub trait Transfer: Send + Sync {
    /// Fetch `task.source_url` and save it as `task.destination_name`
    ///
    /// Returns the number of bytes written.
    async fn fetch(&self, task: &DownloadTask) -> Result<u64>;
}

/// Sequence for partial file names; unique per process
static NEXT_PARTIAL: AtomicU64 = AtomicU64::new(1);

/// Production [`Transfer`] over HTTP(S)
///
/// The body is streamed into a hidden `.part` file next to the destination and
/// renamed into place once complete, so a failed transfer never leaves a
/// truncated document behind. Every transfer gets its own partial file; when
/// two transfers target the same name the last one to finish wins, and the
/// document always holds one complete body.
pub struct HttpTransfer {
    client: reqwest::Client,
    root: PathBuf,
}

impl HttpTransfer {
    /// Create a transfer saving into `root`
    pub fn new(root: impl Into<PathBuf>, user_agent: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder.build().map_err(|e| Error::Config {
            message: format!("Failed to create HTTP client: {}", e),
            key: Some("download.user_agent".to_string()),
        })?;

        Ok(Self {
            client,
            root: root.into(),
        })
    }
}

#[async_trait::async_trait]
impl Transfer for HttpTransfer {
    async fn fetch(&self, task: &DownloadTask) -> Result<u64> {
        let url = task.source_url.as_str();
        let mut response = self.client.get(url).send().await.map_err(|e| {
            let message = if e.is_connect() {
                format!("Connection failed for URL '{}': {}", url, e)
            } else {
                format!("Failed to fetch '{}': {}", url, e)
            };
            RemoteError::network(message)
        })?;

        if !response.status().is_success() {
            return Err(RemoteError::network(format!(
                "HTTP error {} fetching '{}'",
                response.status(),
                url
            ))
            .into());
        }

        let destination = self.root.join(&task.destination_name);
        let sequence = NEXT_PARTIAL.fetch_add(1, Ordering::Relaxed);
        let partial = self
            .root
            .join(format!(".{}.{}.part", task.destination_name, sequence));

        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written: u64 = 0;
        let streamed = async {
            while let Some(chunk) = response.chunk().await.map_err(|e| {
                RemoteError::network(format!("Failed to read body from '{}': {}", url, e))
            })? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<(), Error>(())
        }
        .await;
        drop(file);

        if let Err(e) = streamed {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                tracing::warn!(path = %partial.display(), error = %cleanup, "failed to remove partial download");
            }
            return Err(e);
        }

        tokio::fs::rename(&partial, &destination).await?;
        tracing::debug!(url, destination = %destination.display(), bytes = written, "transfer complete");
        Ok(written)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_saves_body_under_destination_name() {
        let dir = tempfile::tempdir().unwrap();
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 2048]))
            .mount(&mock_server)
            .await;

        let transfer = HttpTransfer::new(dir.path(), None).unwrap();
        let task = DownloadTask::new(format!("{}/img/logo.png", mock_server.uri()), "logo.png");
        let written = transfer.fetch(&task).await.unwrap();

        assert_eq!(written, 2048);
        assert_eq!(std::fs::read(dir.path().join("logo.png")).unwrap(), vec![7u8; 2048]);
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["logo.png"]);
    }

    #[tokio::test]
    async fn non_success_status_is_a_network_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let transfer = HttpTransfer::new(dir.path(), Some("appview-bridge-test")).unwrap();
        let task = DownloadTask::new(format!("{}/missing.png", mock_server.uri()), "missing.png");

        match transfer.fetch(&task).await {
            Err(Error::Execution(remote)) => {
                assert_eq!(remote.kind, RemoteErrorKind::Network);
                assert!(remote.message.contains("404"));
            }
            other => panic!("expected network failure, got {:?}", other),
        }
        assert!(!dir.path().join("missing.png").exists());
    }

    #[tokio::test]
    async fn fetch_replaces_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.json"), b"stale").unwrap();

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"fresh\":true}"))
            .mount(&mock_server)
            .await;

        let transfer = HttpTransfer::new(dir.path(), None).unwrap();
        let task = DownloadTask::new(format!("{}/data.json", mock_server.uri()), "data.json");
        transfer.fetch(&task).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("data.json")).unwrap(),
            "{\"fresh\":true}"
        );
    }

    #[tokio::test]
    async fn concurrent_fetches_to_one_name_leave_one_complete_body() {
        let dir = tempfile::tempdir().unwrap();
        let mock_server = MockServer::start().await;
        let large = vec![b'A'; 1024 * 1024];
        let small = vec![b'B'; 1024];
        Mock::given(method("GET"))
            .and(path("/x/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(large.clone()))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/y/logo.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(small.clone())
                    .set_delay(std::time::Duration::from_millis(5)),
            )
            .mount(&mock_server)
            .await;

        let transfer = HttpTransfer::new(dir.path(), None).unwrap();
        let first = DownloadTask::new(format!("{}/x/logo.png", mock_server.uri()), "logo.png");
        let second = DownloadTask::new(format!("{}/y/logo.png", mock_server.uri()), "logo.png");
        let (a, b) = tokio::join!(transfer.fetch(&first), transfer.fetch(&second));

        assert_eq!(a.unwrap(), large.len() as u64);
        assert_eq!(b.unwrap(), small.len() as u64);
        let saved = std::fs::read(dir.path().join("logo.png")).unwrap();
        assert!(saved == large || saved == small, "saved body is a mix of {} bytes", saved.len());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
