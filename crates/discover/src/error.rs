//! Discovery Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A discovery error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The first load has not finished; try again shortly.
    #[display("series index is still loading")]
    NotReady,
    #[display("no series matches '{_0}'")]
    NotFound(#[error(not(source))] String),
    /// The name matches several series; ask for something more specific.
    #[display("{matches} series match '{query}', please be more specific")]
    Ambiguous { query: String, matches: usize },
    /// Listing failed in a way retrying will not fix.
    #[display("failed to list series from the remote source")]
    Remote,
    #[display("failed to read or write the index snapshot")]
    Snapshot,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady | Self::Snapshot)
    }
}
