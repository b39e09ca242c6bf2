//! Error types for appview-bridge
//!
//! Errors fall into four families:
//! - [`ValidationError`] - malformed call arguments, raised synchronously before
//!   anything crosses the boundary
//! - [`RemoteError`] - a host-side failure, carried across the boundary as a
//!   tagged `Failure` outcome
//! - [`ProtocolError`] - a message that is neither a recognized envelope nor a
//!   recognized settlement
//! - executor-internal failures (I/O, HTTP, SQL) which are converted into a
//!   [`RemoteError`] before they leave the host

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for appview-bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for appview-bridge
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "documents_dir")
        key: Option<String>,
    },

    /// Call arguments were rejected before dispatch
    #[error("invalid arguments: {0}")]
    Validation(#[from] ValidationError),

    /// The host executed the call and reported a failure
    #[error("{0}")]
    Execution(#[from] RemoteError),

    /// A boundary message could not be understood
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Base64 content could not be decoded
    #[error("invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Text content was not valid UTF-8
    #[error("invalid UTF-8 content: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The bridge was torn down before the call settled
    #[error("bridge is shutting down")]
    ShuttingDown,
}

impl Error {
    /// Machine-readable error code, stable across releases
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::Execution(remote) => remote.kind.as_str(),
            Error::Protocol(_) => "protocol_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Sqlx(_) => "sql_error",
            Error::Serialization(_) => "serialization_error",
            Error::Base64(_) | Error::Utf8(_) => "invalid_data",
            Error::ShuttingDown => "shutting_down",
        }
    }
}

/// Argument validation failures
///
/// These never produce a pending call: the dispatcher checks arguments before it
/// allocates a correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No operation is registered under this channel name
    #[error("unknown operation channel \"{0}\"")]
    UnknownOperation(String),

    /// Wrong number of arguments
    #[error("{operation} takes {expected} parameters, but was called with {actual}")]
    ArgumentCount {
        /// Operation channel name
        operation: &'static str,
        /// Number of arguments the operation takes
        expected: usize,
        /// Number of arguments actually supplied
        actual: usize,
    },

    /// An argument had the wrong JSON type
    #[error("{operation} argument {index} must be a {expected}")]
    WrongType {
        /// Operation channel name
        operation: &'static str,
        /// Zero-based argument position (not counting the correlation id)
        index: usize,
        /// Expected type description
        expected: &'static str,
    },

    /// A file name or path was empty
    #[error("the path parameter was an empty string")]
    EmptyPath,

    /// A basename contained whitespace
    #[error("the basename parameter cannot contain whitespace: \"{0}\"")]
    PathWhitespace(String),

    /// A basename contained a path separator or NUL
    #[error("the basename parameter cannot contain separators: \"{0}\"")]
    PathSeparator(String),

    /// A path tried to escape the documents directory
    #[error("the path parameter cannot leave the documents directory: \"{0}\"")]
    PathTraversal(String),

    /// A URL pointed at the local file system
    #[error("url parameter should not point to the file system: \"{0}\"")]
    LocalUrl(String),

    /// A URL was not an absolute remote URL
    #[error("the url parameter must be a remote URL with a scheme and a domain or IP: \"{0}\"")]
    NotRemoteUrl(String),

    /// An encoding other than `utf8` or `base64` was requested
    #[error("unsupported encoding \"{0}\" (expected utf8 or base64)")]
    UnsupportedEncoding(String),
}

/// Broad classification of a host-side failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// The named file or resource does not exist
    NotFound,
    /// The host lacks permission for the operation
    PermissionDenied,
    /// The target already exists
    AlreadyExists,
    /// The host rejected the arguments
    InvalidInput,
    /// Content could not be decoded (bad UTF-8, bad base64)
    InvalidData,
    /// Any other I/O failure
    Io,
    /// Remote fetch failed (connection, non-success status)
    Network,
    /// SQL statement failed
    Sql,
    /// Host-internal failure (panicked task, serialization)
    Internal,
}

impl RemoteErrorKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteErrorKind::NotFound => "not_found",
            RemoteErrorKind::PermissionDenied => "permission_denied",
            RemoteErrorKind::AlreadyExists => "already_exists",
            RemoteErrorKind::InvalidInput => "invalid_input",
            RemoteErrorKind::InvalidData => "invalid_data",
            RemoteErrorKind::Io => "io_error",
            RemoteErrorKind::Network => "network_error",
            RemoteErrorKind::Sql => "sql_error",
            RemoteErrorKind::Internal => "internal_error",
        }
    }
}

impl std::fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the host, as carried across the boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    /// Failure classification
    pub kind: RemoteErrorKind,
    /// Human-readable description
    pub message: String,
}

impl RemoteError {
    /// Create a remote error of the given kind
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a network failure
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Network, message)
    }

    /// Create a host-internal failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Internal, message)
    }
}

impl From<&std::io::Error> for RemoteErrorKind {
    fn from(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => RemoteErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => RemoteErrorKind::PermissionDenied,
            std::io::ErrorKind::AlreadyExists => RemoteErrorKind::AlreadyExists,
            std::io::ErrorKind::InvalidInput => RemoteErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => RemoteErrorKind::InvalidData,
            _ => RemoteErrorKind::Io,
        }
    }
}

impl From<&Error> for RemoteError {
    fn from(err: &Error) -> Self {
        let kind = match err {
            Error::Execution(remote) => return remote.clone(),
            Error::Io(e) => RemoteErrorKind::from(e),
            Error::Network(_) => RemoteErrorKind::Network,
            Error::Sqlx(_) => RemoteErrorKind::Sql,
            Error::Validation(_) => RemoteErrorKind::InvalidInput,
            Error::Base64(_) | Error::Utf8(_) => RemoteErrorKind::InvalidData,
            Error::Config { .. }
            | Error::Protocol(_)
            | Error::Serialization(_)
            | Error::ShuttingDown => RemoteErrorKind::Internal,
        };
        RemoteError::new(kind, err.to_string())
    }
}

impl From<Error> for RemoteError {
    fn from(err: Error) -> Self {
        RemoteError::from(&err)
    }
}

/// Malformed boundary traffic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A call envelope could not be parsed
    #[error("malformed call envelope: {0}")]
    MalformedEnvelope(String),

    /// A settlement payload was not a recognized outcome
    #[error("malformed settlement: {0}")]
    MalformedSettlement(String),

    /// The settled value did not have the shape the caller expected
    #[error("unexpected payload shape: {0}")]
    UnexpectedPayload(String),

    /// A correlation id was registered while another call still held it
    #[error("correlation id {0} is already pending")]
    DuplicateId(u64),
}
