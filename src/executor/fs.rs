//! Document file operations, all resolved against the documents directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::codec;
use crate::error::Result;
use crate::types::{Encoding, FileStat};

/// File system access rooted at the documents directory
///
/// Names reaching this type have already been validated, so joining them onto
/// the root never escapes it.
#[derive(Clone, Debug)]
pub struct FileSystem {
    root: PathBuf,
}

impl FileSystem {
    /// Root all operations at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The documents directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a validated relative path
    pub fn resolve(&self, relative: &str) -> PathBuf {
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    /// Metadata for one document
    pub async fn stat(&self, name: &str) -> Result<FileStat> {
        let metadata = tokio::fs::metadata(self.resolve(name)).await?;
        Ok(FileStat {
            name: name.to_string(),
            size: metadata.len(),
            is_file: metadata.is_file(),
            is_dir: metadata.is_dir(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            created: metadata.created().ok().map(DateTime::<Utc>::from),
        })
    }

    /// Whether a document exists
    pub async fn exists(&self, name: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(name)).await?)
    }

    /// Read a document and encode it for transport
    pub async fn read_file(&self, path: &str, encoding: Encoding) -> Result<String> {
        let bytes = tokio::fs::read(self.resolve(path)).await?;
        codec::encode_content(&bytes, encoding)
    }

    /// Decode transported content and write it, replacing any existing document
    pub async fn write_file(&self, name: &str, data: &str, encoding: Encoding) -> Result<()> {
        let bytes = codec::decode_content(data, encoding)?;
        tokio::fs::write(self.resolve(name), bytes).await?;
        Ok(())
    }

    /// Entry names of a documents directory, sorted
    pub async fn readdir(&self, dir: &str) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.resolve(dir)).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Delete a document
    pub async fn unlink(&self, name: &str) -> Result<()> {
        tokio::fs::remove_file(self.resolve(name)).await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, RemoteError, RemoteErrorKind};
    use tempfile::TempDir;

    fn documents() -> (TempDir, FileSystem) {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystem::new(dir.path());
        (dir, fs)
    }

    #[tokio::test]
    async fn write_then_read_text() {
        let (_dir, fs) = documents();
        fs.write_file("notes.txt", "hello `${world}`", Encoding::Utf8)
            .await
            .unwrap();
        assert_eq!(
            fs.read_file("notes.txt", Encoding::Utf8).await.unwrap(),
            "hello `${world}`"
        );
        assert_eq!(
            fs.read_file("notes.txt", Encoding::Base64).await.unwrap(),
            "aGVsbG8gYCR7d29ybGR9YA=="
        );
    }

    #[tokio::test]
    async fn binary_content_needs_base64_to_read() {
        let (_dir, fs) = documents();
        fs.write_file("blob.bin", "//79", Encoding::Base64).await.unwrap();

        assert!(matches!(
            fs.read_file("blob.bin", Encoding::Utf8).await,
            Err(Error::Utf8(_))
        ));
        assert_eq!(fs.read_file("blob.bin", Encoding::Base64).await.unwrap(), "//79");
    }

    #[tokio::test]
    async fn write_replaces_existing_content() {
        let (dir, fs) = documents();
        fs.write_file("a.txt", "first version", Encoding::Utf8).await.unwrap();
        fs.write_file("a.txt", "v2", Encoding::Utf8).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "v2");
    }

    #[tokio::test]
    async fn stat_reports_size_and_kind() {
        let (dir, fs) = documents();
        std::fs::write(dir.path().join("a.txt"), b"12345").unwrap();
        std::fs::create_dir(dir.path().join("www")).unwrap();

        let file = fs.stat("a.txt").await.unwrap();
        assert_eq!(file.name, "a.txt");
        assert_eq!(file.size, 5);
        assert!(file.is_file);
        assert!(!file.is_dir);
        assert!(file.modified.is_some());

        let www = fs.stat("www").await.unwrap();
        assert!(www.is_dir);
    }

    #[tokio::test]
    async fn missing_documents_map_to_not_found() {
        let (_dir, fs) = documents();
        assert!(!fs.exists("missing.txt").await.unwrap());

        for err in [
            fs.stat("missing.txt").await.unwrap_err(),
            fs.read_file("missing.txt", Encoding::Utf8).await.unwrap_err(),
            fs.unlink("missing.txt").await.unwrap_err(),
        ] {
            assert_eq!(RemoteError::from(&err).kind, RemoteErrorKind::NotFound);
        }
    }

    #[tokio::test]
    async fn readdir_is_sorted_and_unlink_removes() {
        let (dir, fs) = documents();
        for name in ["c.txt", "a.txt", "b.txt"] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }
        assert_eq!(fs.readdir("").await.unwrap(), vec!["a.txt", "b.txt", "c.txt"]);

        fs.unlink("b.txt").await.unwrap();
        assert!(!fs.exists("b.txt").await.unwrap());
        assert_eq!(fs.readdir("").await.unwrap(), vec!["a.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn readdir_of_subdirectory() {
        let (dir, fs) = documents();
        std::fs::create_dir_all(dir.path().join("www/img")).unwrap();
        std::fs::write(dir.path().join("www/index.html"), "<html>").unwrap();
        assert_eq!(fs.readdir("www").await.unwrap(), vec!["img", "index.html"]);
    }
}
