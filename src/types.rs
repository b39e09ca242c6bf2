//! Core types for appview-bridge

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::Outcome;
use crate::error::ValidationError;

/// Token linking a dispatched call to its eventual settlement
///
/// Unique among currently pending calls of one bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl CorrelationId {
    /// Create a new CorrelationId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CorrelationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<CorrelationId> for u64 {
    fn from(id: CorrelationId) -> Self {
        id.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host operations reachable through the bridge
///
/// Each operation has its own named channel; the channel name is the only thing
/// that tells the executor what to do with an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Stat a document
    Stat,
    /// Check whether a document exists
    Exists,
    /// Read a document as text or base64
    ReadFile,
    /// Write a document
    WriteFile,
    /// List a documents directory
    Readdir,
    /// Delete a document
    Unlink,
    /// Fetch one remote URL into a document
    DownloadToFile,
    /// Fetch many remote URLs with bounded concurrency
    DownloadFiles,
    /// Run one SQL statement
    SqliteQuery,
}

impl Operation {
    /// Every operation, in channel registration order
    pub const ALL: [Operation; 9] = [
        Operation::Stat,
        Operation::Exists,
        Operation::ReadFile,
        Operation::WriteFile,
        Operation::Readdir,
        Operation::Unlink,
        Operation::DownloadToFile,
        Operation::DownloadFiles,
        Operation::SqliteQuery,
    ];

    /// Channel name the operation is posted on
    pub fn channel(&self) -> &'static str {
        match self {
            Operation::Stat => "fs.stat",
            Operation::Exists => "fs.exists",
            Operation::ReadFile => "fs.readFile",
            Operation::WriteFile => "fs.writeFile",
            Operation::Readdir => "fs.readdir",
            Operation::Unlink => "fs.unlink",
            Operation::DownloadToFile => "fs.downloadToFile",
            Operation::DownloadFiles => "fs.downloadFiles",
            Operation::SqliteQuery => "sqlite.query",
        }
    }

    /// Look up an operation by channel name
    pub fn from_channel(channel: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.channel() == channel)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.channel())
    }
}

/// File content transport encoding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Content is UTF-8 text, carried as-is
    #[default]
    Utf8,
    /// Content is arbitrary bytes, carried as standard base64
    Base64,
}

impl Encoding {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Base64 => "base64",
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Encoding {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "utf8" => Ok(Encoding::Utf8),
            "base64" => Ok(Encoding::Base64),
            other => Err(ValidationError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Metadata for one document, as returned by `fs.stat`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Name the stat was requested for
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Whether the entry is a regular file
    pub is_file: bool,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Last modification time, if the platform reports it
    pub modified: Option<DateTime<Utc>>,
    /// Creation time, if the platform reports it
    pub created: Option<DateTime<Utc>>,
}

/// One remote resource scheduled for download
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Absolute remote URL
    pub source_url: String,
    /// Document name the content is saved as
    pub destination_name: String,
}

impl DownloadTask {
    /// Create a download task
    pub fn new(source_url: impl Into<String>, destination_name: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            destination_name: destination_name.into(),
        }
    }
}

/// Result of one task within a batch download
///
/// `outcome` is `Value(bytes_written)` on success and `Failure` otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// URL the task fetched
    pub url: String,
    /// Destination document, if one could be derived from the URL
    pub destination: Option<String>,
    /// Per-task outcome
    pub outcome: Outcome,
}

impl TaskOutcome {
    /// Whether the task saved its file
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Value(_))
    }
}
