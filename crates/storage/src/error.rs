//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong reading or writing a blob.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No blob or file at this path. A dual backend falls back on it.
    #[display("not stored: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The bucket could not be reached.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Absolute, escaping the root, or otherwise not a relative shard path.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Not a lowercase hex SHA-256 digest.
    #[display("invalid content hash: {_0}")]
    InvalidHash(#[error(not(source))] String),
    /// The backend answered, but not with what was asked for.
    #[display("{_0}")]
    Backend(#[error(not(source))] String),
    /// Storage mode or credentials do not add up.
    #[display("storage misconfigured: {_0}")]
    Misconfigured(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::Backend(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
