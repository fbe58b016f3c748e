//! Orchestrator Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An orchestrator error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The series index is (re)loading. Not the same as "not found": retry
    /// shortly.
    #[display("series index is not loaded yet")]
    CacheNotReady,
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    #[display("{matches} series match '{query}', please be more specific")]
    Ambiguous { query: String, matches: usize },
    /// Fetching from the remote source failed.
    #[display("remote source error")]
    Remote,
    #[display("catalog error")]
    Catalog,
    #[display("series index error")]
    Discovery,
    /// The queue snapshot could not be read or written.
    #[display("queue snapshot error")]
    Snapshot,
    #[display("invalid schedule: {_0}")]
    InvalidSchedule(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CacheNotReady | Self::Remote | Self::Snapshot)
    }
}
