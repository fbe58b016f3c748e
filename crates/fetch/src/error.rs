//! Fetch Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The request never got a response (connection, TLS, timeout).
    #[display("network error requesting {_0}")]
    Network(#[error(not(source))] String),
    #[display("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    /// The page loaded but its markup is not what the parsers expect.
    #[display("unexpected page structure")]
    Parse,
    #[display("image conversion failed: {_0}")]
    Convert(#[error(not(source))] String),
    /// A retry policy ran out of attempts; the last failure is attached.
    #[display("giving up after {_0} attempts")]
    Exhausted(#[error(not(source))] u32),
    #[display("invalid HTTP client configuration")]
    Misconfigured,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// The remote answered, or failed to answer, for this one URL.
    ///
    /// Episode probing moves on to the next episode number on these.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Status { .. })
    }
}
