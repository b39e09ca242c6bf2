//! Startup staging of bundled web resources into the documents directory.
//!
//! Only the top level of the source directory is considered. Web files are
//! recognized by extension, and an `img` directory is copied recursively.
//! Any existing copy in the documents directory is removed first.

use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use tokio::task::spawn_blocking;

use crate::error::{Error, Result};

const WEB_FILE_PATTERN: &str = r"\.(html?|js|css|jpe?g|gif|png|svg|woff2?|ttf)$";

/// Name of the image directory staged alongside web files
pub const IMAGE_DIR: &str = "img";

fn web_file_regex() -> Result<Regex> {
    RegexBuilder::new(WEB_FILE_PATTERN)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Config {
            message: format!("invalid web resource pattern: {}", e),
            key: None,
        })
}

/// Whether a top-level resource entry should be staged
pub fn is_web_resource(name: &str, is_dir: bool, pattern: &Regex) -> bool {
    if is_dir {
        name == IMAGE_DIR
    } else {
        pattern.is_match(name)
    }
}

/// Copy web resources from `source` into `documents`, replacing stale copies
///
/// Returns the number of top-level entries staged.
pub async fn copy_web_resources(source: &Path, documents: &Path) -> Result<usize> {
    let pattern = web_file_regex()?;
    let source_owned = source.to_path_buf();
    let documents_owned = documents.to_path_buf();

    let copied = spawn_blocking(move || stage(&source_owned, &documents_owned, &pattern))
        .await
        .map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "resource staging task panicked: {}",
                e
            )))
        })??;

    tracing::info!(source = %source.display(), copied, "web resources staged");
    Ok(copied)
}

fn stage(source: &Path, documents: &Path, pattern: &Regex) -> Result<usize> {
    let mut copied = 0;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type()?.is_dir();
        if !is_web_resource(&name, is_dir, pattern) {
            continue;
        }

        let target: PathBuf = documents.join(&name);
        remove_existing(&target)?;
        if is_dir {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
        tracing::debug!(resource = %name, "staged web resource");
        copied += 1;
    }
    Ok(copied)
}

fn remove_existing(target: &Path) -> std::io::Result<()> {
    match std::fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(target),
        Ok(_) => std::fs::remove_file(target),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
