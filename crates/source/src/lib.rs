//! Models and parsers for the remote webtoon source.
//!
//! Nothing in here performs I/O: fetchers hand raw HTML to the [`parse`]
//! functions and get models back, which keeps every scraper testable against
//! static fixtures.

mod consts;
pub mod error;
pub mod models;
pub mod parse;
mod resolve;
mod urls;

pub use crate::consts::{GENRES, LANGUAGES};
pub use crate::resolve::{find_entry, normalize};
pub use crate::urls::Endpoints;
