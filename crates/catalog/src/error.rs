//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    #[display("series not found: {_0}")]
    SeriesNotFound(#[error(not(source))] String),
    #[display("episode not found: {_0}")]
    EpisodeNotFound(#[error(not(source))] String),
    /// The genre is not one the catalog was seeded with.
    #[display("genre not found: {_0}")]
    GenreNotFound(#[error(not(source))] String),
    /// Writing or reading image bytes failed.
    #[display("blob storage error")]
    Storage,
    /// Serialization/deserialization error.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SeriesNotFound(_) | Self::EpisodeNotFound(_) | Self::GenreNotFound(_))
    }
}
