//! Discovery cache: the index of every series the remote source lists.
//!
//! Listing the whole remote takes a long time, so the index is kept in a JSON
//! snapshot and only rebuilt on request. Names typed by an operator are
//! resolved against it with [`DiscoveryCache::find_entry`].

mod cache;
pub mod error;

pub use crate::cache::{DiscoveryCache, Index, merge};
