//! Argument validation run before a call crosses the boundary
//!
//! Every check here is synchronous and side-effect free, so a rejected call
//! never allocates a correlation id or touches the registry.

use serde_json::Value;

use crate::error::ValidationError;
use crate::types::{Encoding, Operation};

type Validation<T> = std::result::Result<T, ValidationError>;

impl Operation {
    /// Check the argument list for this operation
    pub fn validate(&self, args: &[Value]) -> Validation<()> {
        let op = self.channel();
        match self {
            Operation::Stat | Operation::Exists | Operation::Unlink => {
                arg_count(op, 1, args)?;
                basename(string_arg(op, args, 0)?)?;
            }
            Operation::ReadFile => {
                arg_count(op, 2, args)?;
                relative_path(string_arg(op, args, 0)?)?;
                encoding(string_arg(op, args, 1)?)?;
            }
            Operation::WriteFile => {
                arg_count(op, 3, args)?;
                basename(string_arg(op, args, 0)?)?;
                string_arg(op, args, 1)?;
                encoding(string_arg(op, args, 2)?)?;
            }
            Operation::Readdir => {
                arg_count(op, 1, args)?;
                let dir = string_arg(op, args, 0)?;
                if !dir.is_empty() {
                    relative_path(dir)?;
                }
            }
            Operation::DownloadToFile => {
                arg_count(op, 2, args)?;
                remote_url(string_arg(op, args, 0)?)?;
                basename(string_arg(op, args, 1)?)?;
            }
            Operation::DownloadFiles => {
                for index in 0..args.len() {
                    remote_url(string_arg(op, args, index)?)?;
                }
            }
            Operation::SqliteQuery => {
                arg_count(op, 1, args)?;
                string_arg(op, args, 0)?;
            }
        }
        Ok(())
    }
}

/// Require exactly `expected` arguments
pub fn arg_count(operation: &'static str, expected: usize, args: &[Value]) -> Validation<()> {
    if args.len() != expected {
        return Err(ValidationError::ArgumentCount {
            operation,
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

/// Borrow argument `index` as a string
pub fn string_arg<'a>(
    operation: &'static str,
    args: &'a [Value],
    index: usize,
) -> Validation<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or(ValidationError::WrongType {
            operation,
            index,
            expected: "string",
        })
}

/// A single document name: non-empty, no whitespace, no separators, not `.`/`..`
pub fn basename(name: &str) -> Validation<()> {
    if name.is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ValidationError::PathWhitespace(name.to_string()));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(ValidationError::PathSeparator(name.to_string()));
    }
    if name == "." || name == ".." {
        return Err(ValidationError::PathTraversal(name.to_string()));
    }
    Ok(())
}

/// A path relative to the documents directory that cannot climb out of it
pub fn relative_path(path: &str) -> Validation<()> {
    if path.is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    if path.contains(['\\', '\0']) {
        return Err(ValidationError::PathSeparator(path.to_string()));
    }
    if path.starts_with('/') || path.split('/').any(|segment| segment == "..") {
        return Err(ValidationError::PathTraversal(path.to_string()));
    }
    Ok(())
}

/// A plausibly remote URL: parseable, with `://` and at least one `.`; never `file://`
pub fn remote_url(raw: &str) -> Validation<url::Url> {
    if raw.starts_with("file://") {
        return Err(ValidationError::LocalUrl(raw.to_string()));
    }
    let not_remote = || ValidationError::NotRemoteUrl(raw.to_string());
    if !raw.contains("://") || !raw.contains('.') {
        return Err(not_remote());
    }
    let parsed = url::Url::parse(raw).map_err(|_| not_remote())?;
    if parsed.scheme() == "file" {
        return Err(ValidationError::LocalUrl(raw.to_string()));
    }
    if !parsed.has_host() {
        return Err(not_remote());
    }
    Ok(parsed)
}

/// One of the two transport encodings
pub fn encoding(raw: &str) -> Validation<Encoding> {
    raw.parse()
}
