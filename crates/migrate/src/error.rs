//! Migration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A migration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading from or writing to a backend failed.
    #[display("storage error")]
    Storage,
    #[display("catalog error")]
    Catalog,
    /// Refused because the instance runs in production.
    #[display("refusing to {_0} in production")]
    Blocked(#[error(not(source))] &'static str),
    #[display("migration misconfigured: {_0}")]
    Misconfigured(#[error(not(source))] String),
    /// The other instance did not answer, or answered with an error.
    #[display("peer request failed: {_0}")]
    Peer(#[error(not(source))] String),
    /// A chunk archive could not be built or read.
    #[display("invalid chunk bundle")]
    Bundle,
    /// A bundled blob does not hash to its file name.
    #[display("blob {expected} arrived with hash {actual}")]
    Integrity { expected: String, actual: String },
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Peer(_) | Self::Io)
    }
}
