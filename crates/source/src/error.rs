//! Parsing Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A parsing or resolution error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for parsing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required element or attribute is absent from the page; the layout
    /// probably changed.
    #[display("missing required field: {_0}")]
    MissingField(#[error(not(source))] &'static str),
    /// A field was found but could not be parsed.
    #[display("failed to parse field '{field}', found value: {value}")]
    ParseError {
        /// The field that failed to parse.
        field: &'static str,
        /// The offending value.
        value: String,
    },
    /// No entry matched the query at any tier.
    #[display("no series matches '{_0}'")]
    NoMatch(#[error(not(source))] String),
    /// More than one entry matched at the deciding tier.
    #[display("{matches} series match '{query}', please be more specific")]
    Ambiguous { query: String, matches: usize },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Markup is either what we expect or it isn't, and resolution is
        // deterministic over a given listing.
        false
    }
}
