//! Binary Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A top-level error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for commands.
pub type Result<T> = std::result::Result<T, Error>;

/// Which part of the system a command failed in.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("storage error")]
    Storage,
    #[display("catalog error")]
    Catalog,
    #[display("series index error")]
    Discovery,
    #[display("download error")]
    Download,
    #[display("HTTP client error")]
    Fetch,
    #[display("migration error")]
    Migration,
    #[display("I/O error")]
    Io,
    #[display("misconfigured: {_0}")]
    Misconfigured(#[error(not(source))] String),
}
